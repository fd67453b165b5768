use clap::Parser;
use film_layout::project::NewPiece;
use film_layout::render;
use film_layout::selector::ScoreStrategy;
use film_layout::{CuttingProject, LayoutConfig, Placement, Rect, Roll};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "film_layout",
    about = "Lay out rectangular film pieces on a roll, minimizing the length used"
)]
struct Cli {
    /// Roll as WIDTHxLENGTH in mm (e.g. 1220x60000); WIDTH alone means an unbounded strip
    #[arg(long)]
    roll: String,

    /// Pieces as WxH:qty (e.g. 500x400:2 1300x200:1)
    #[arg(long = "pieces", num_args = 1..)]
    pieces: Vec<String>,

    /// Already cut pieces as WxH@X,Y, with a trailing `r` when laid rotated (e.g. 500x400@0,0r)
    #[arg(long = "fixed", num_args = 1..)]
    fixed: Vec<String>,

    /// Disable piece rotation
    #[arg(long)]
    no_rotate: bool,

    /// Fit heuristic: best-area, best-short-side, or best-long-side
    #[arg(long, default_value = "best-area", value_parser = parse_strategy)]
    strategy: ScoreStrategy,

    /// Maximum number of pieces to lay out in one run
    #[arg(long, default_value_t = LayoutConfig::DEFAULT_MAX_PENDING)]
    max_pieces: usize,

    /// Show ASCII layout of the roll
    #[arg(long)]
    layout: bool,

    /// Print the layout as JSON
    #[arg(long)]
    json: bool,

    /// Log optimizer progress to stderr
    #[arg(long, short)]
    verbose: bool,
}

fn parse_strategy(s: &str) -> Result<ScoreStrategy, String> {
    match s {
        "best-area" => Ok(ScoreStrategy::BestAreaFit),
        "best-short-side" => Ok(ScoreStrategy::BestShortSideFit),
        "best-long-side" => Ok(ScoreStrategy::BestLongSideFit),
        _ => Err(format!(
            "invalid strategy '{}', expected: best-area, best-short-side, or best-long-side",
            s
        )),
    }
}

fn parse_mm(s: &str, what: &str, input: &str) -> Result<u32, String> {
    s.parse::<u32>()
        .map_err(|_| format!("invalid {} in '{}'", what, input))
}

fn parse_dimensions(s: &str) -> Result<Rect, String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("invalid dimensions '{}', expected WxH", s))?;
    let rect = Rect::new(parse_mm(w, "width", s)?, parse_mm(h, "height", s)?);
    if rect.w == 0 || rect.h == 0 {
        return Err(format!("dimensions must be non-zero in '{}'", s));
    }
    Ok(rect)
}

fn parse_roll(s: &str) -> Result<Roll, String> {
    match s.split_once('x') {
        Some(_) => {
            let rect = parse_dimensions(s)?;
            Ok(Roll::bounded(rect.w, rect.h))
        }
        None => Ok(Roll::strip(parse_mm(s, "width", s)?)),
    }
}

fn parse_piece(s: &str) -> Result<NewPiece, String> {
    let (dims, qty) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid piece '{}', expected WxH:qty", s))?;
    let qty = parse_mm(qty, "quantity", s)?;
    if qty == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    Ok(NewPiece::new(parse_dimensions(dims)?, qty))
}

fn parse_fixed(s: &str) -> Result<NewPiece, String> {
    let (dims, pos) = s
        .split_once('@')
        .ok_or_else(|| format!("invalid fixed piece '{}', expected WxH@X,Y", s))?;
    let rect = parse_dimensions(dims)?;
    let (pos, rotated) = match pos.strip_suffix('r') {
        Some(pos) => (pos, true),
        None => (pos, false),
    };
    let (x, y) = pos
        .split_once(',')
        .ok_or_else(|| format!("invalid position in '{}', expected X,Y", s))?;
    let footprint = if rotated { rect.rotated() } else { rect };
    let placement = Placement::new(parse_mm(x, "x", s)?, parse_mm(y, "y", s)?, footprint, rotated);
    NewPiece::completed_at(rect, vec![placement]).map_err(|e| e.to_string())
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let roll = parse_roll(&cli.roll).unwrap_or_else(|e| fail(e));
    let mut pieces: Vec<NewPiece> = cli
        .fixed
        .iter()
        .map(|f| parse_fixed(f))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| fail(e));
    pieces.extend(
        cli.pieces
            .iter()
            .map(|p| parse_piece(p))
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_else(|e| fail(e)),
    );

    let config = LayoutConfig {
        max_pending: cli.max_pieces,
        strategy: cli.strategy,
    };
    let mut project = CuttingProject::new(roll, !cli.no_rotate, config).unwrap_or_else(|e| fail(e));
    project.add_pieces(pieces).unwrap_or_else(|e| fail(e));
    let layout = project.layout();

    if cli.json {
        match serde_json::to_string_pretty(layout) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(e),
        }
        return;
    }

    println!("Roll {}:", roll);
    for p in &layout.placements {
        let rot = if p.placement.rotated { " [rotated]" } else { "" };
        let fixed = if p.fixed { " [fixed]" } else { "" };
        println!(
            "  {} {} @ ({}, {}){}{}",
            p.id, p.placement.rect, p.placement.x, p.placement.y, rot, fixed
        );
    }
    if cli.layout {
        print!("{}", render::render_layout(layout));
    }
    for id in &layout.unplaced {
        if let Some(instance) = project.instances().iter().find(|i| i.id == *id) {
            println!("  {} {} does not fit", id, instance.rect);
        }
    }
    println!();

    println!(
        "Summary: {} piece{} placed, {} unplaced, {}mm used, {:.1}% waste",
        layout.placements.len(),
        if layout.placements.len() == 1 { "" } else { "s" },
        layout.unplaced.len(),
        layout.used_length,
        layout.waste_percent(),
    );
}
