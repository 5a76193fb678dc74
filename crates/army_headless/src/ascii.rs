//! ASCII board renderer for terminal play.
//!
//! Draws the render list on the 20x20 grid, one character per cell. White
//! entities are lowercase and black ones uppercase.

use army_core::components::Archetype;
use army_core::entities::{EntityKind, EntityView};
use army_core::factions::{FactionId, CITY_SIZE};
use army_core::math::{COLS, ROWS};
use army_core::simulation::Simulation;

/// ASCII rendering configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Show the symbol legend under the board.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            use_color: true,
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const BLUE: &str = "\x1b[34m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Character for one entity.
fn entity_char(view: &EntityView) -> char {
    let base = match view.kind {
        EntityKind::City => 'h',
        EntityKind::Tree => return 'T',
        EntityKind::Flag => return 'F',
        EntityKind::Stone => return '*',
        EntityKind::Unit(Archetype::Collector) => 'c',
        EntityKind::Unit(Archetype::Deserter) => 'd',
        EntityKind::Unit(Archetype::Cavalry) => 'v',
        EntityKind::Unit(Archetype::Pikeman) => 'p',
    };
    match view.faction {
        Some(FactionId::Black) => base.to_ascii_uppercase(),
        _ => base,
    }
}

fn entity_color(view: &EntityView) -> &'static str {
    match (view.kind, view.faction) {
        (EntityKind::Tree, _) => colors::GREEN,
        (EntityKind::Flag | EntityKind::Stone, _) => colors::YELLOW,
        (_, Some(FactionId::White)) => colors::BLUE,
        (_, Some(FactionId::Black)) => colors::RED,
        (_, None) => colors::GRAY,
    }
}

/// Draw priority: later layers overwrite earlier ones.
fn layer(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::City => 0,
        EntityKind::Tree => 1,
        EntityKind::Stone => 2,
        EntityKind::Flag => 3,
        EntityKind::Unit(_) => 4,
    }
}

/// Render the render list as a grid, row `y` by row, column `x` across.
pub fn render_ascii(views: &[EntityView], config: &AsciiConfig) -> String {
    let width = usize::try_from(ROWS).unwrap_or(0);
    let height = usize::try_from(COLS).unwrap_or(0);
    let mut grid: Vec<Vec<(char, &'static str)>> = vec![vec![('.', ""); width]; height];

    let mut ordered: Vec<&EntityView> = views.iter().collect();
    ordered.sort_by_key(|v| layer(v.kind));

    for view in ordered {
        let ch = entity_char(view);
        let color = entity_color(view);
        let span = if view.kind == EntityKind::City { CITY_SIZE } else { 1 };
        for dx in 0..span {
            for dy in 0..span {
                let (Ok(x), Ok(y)) = (
                    usize::try_from(view.position.x + dx),
                    usize::try_from(view.position.y + dy),
                ) else {
                    continue;
                };
                if let Some(cell) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
                    *cell = (ch, color);
                }
            }
        }
    }

    let mut output = String::new();
    let border: String = "═".repeat(width);
    output.push_str(&format!("╔{border}╗\n"));
    for row in &grid {
        output.push('║');
        for (ch, color) in row {
            if config.use_color && !color.is_empty() {
                output.push_str(color);
                output.push(*ch);
                output.push_str(colors::RESET);
            } else {
                output.push(*ch);
            }
        }
        output.push_str("║\n");
    }
    output.push_str(&format!("╚{border}╝\n"));

    if config.show_legend {
        output.push_str("h/H city  c/C collector  d/D deserter  v/V cavalry  p/P pikeman\n");
        output.push_str("T tree  F flag  * stone  (lowercase white, uppercase black)\n");
    }
    output
}

/// Render a full frame: status line plus board.
pub fn render_frame(sim: &Simulation, config: &AsciiConfig) -> String {
    let (bold, reset) = if config.use_color {
        (colors::BOLD, colors::RESET)
    } else {
        ("", "")
    };
    let mut output = format!(
        "{bold}Tick {} │ {:.1}s{reset}\n",
        sim.get_tick(),
        sim.now_ms() as f64 / 1_000.0
    );
    for faction in FactionId::ALL {
        let wood = sim.world().city(faction).map_or(0, |c| c.wood);
        output.push_str(&format!(
            "{:<10} units {:>3}  wood {:>4}\n",
            faction.display_name(),
            sim.unit_count(faction),
            wood
        ));
    }
    output.push_str(&render_ascii(&sim.render_list(), config));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use army_core::math::GridPos;

    fn plain() -> AsciiConfig {
        AsciiConfig {
            show_legend: false,
            use_color: false,
        }
    }

    #[test]
    fn test_empty_board_shows_cities() {
        let sim = Simulation::bare(1, 0);
        let text = render_ascii(&sim.render_list(), &plain());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 22);
        // Row y = 0 crosses the white city at x = 7..12.
        assert_eq!(lines[1], "║.......hhhhh........║");
        // Row y = 19 crosses the black city at x = 7..12.
        assert_eq!(lines[20], "║.......HHHHH........║");
    }

    #[test]
    fn test_units_draw_over_terrain() {
        let mut sim = Simulation::bare(1, 0);
        let cell = GridPos::new(2, 3);
        sim.world_mut().place_stone(cell);
        sim.world_mut()
            .insert_unit(FactionId::Black, cell, army_core::components::Behavior::cavalry());
        let text = render_ascii(&sim.render_list(), &plain());
        let row: Vec<char> = text.lines().nth(1 + 3).unwrap().chars().collect();
        assert_eq!(row[1 + 2], 'V');
    }

    #[test]
    fn test_frame_has_status_lines() {
        let sim = Simulation::bare(1, 0);
        let frame = render_frame(&sim, &plain());
        assert!(frame.starts_with("Tick 0"));
        assert!(frame.contains("White Army"));
        assert!(frame.contains("Black Army"));
    }
}
