use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::time::Instant;
use strum::IntoEnumIterator;
use synopt::evaluation::EvaluationResult;
use synopt::optimizer::{GenerationStats, ProgressCallback};
use synopt::params::{ship_type_name, Parameter, ParameterVector};
use synopt::workflows::export::TypeExport;
use synopt::workflows::folds::{CampaignReport, FoldSummary, TrainSummary, ValidationRow};
use synopt::workflows::online::{OnlineEvalRow, SegmentReport};
use synopt::workflows::sweep::{BoundsCell, HyperGrid, SweepCell};
use tracing::info;

/// Logs one line per generation with the elapsed wall time.
pub struct ConsoleProgress {
    started: Instant,
    ngen: usize,
}

impl ConsoleProgress {
    pub fn new(ngen: usize) -> Self {
        Self {
            started: Instant::now(),
            ngen,
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_generation(&self, s: &GenerationStats) -> bool {
        info!(
            "🧬 Gen {}/{} | evals {} | min {:.4} | avg {:.4} | {:.0}s",
            s.generation,
            self.ngen,
            s.evaluations,
            s.min,
            s.avg,
            self.started.elapsed().as_secs_f64()
        );
        true
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn align_right(table: &mut Table, cols: std::ops::RangeInclusive<usize>) {
    for i in cols {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

fn result_cells(r: Option<&EvaluationResult>) -> [Cell; 2] {
    match r {
        Some(r) => [
            Cell::new(format!("{:.3}", r.rmse)),
            Cell::new(format!("{:.2}%", 100.0 * r.ratio)),
        ],
        None => [Cell::new("-"), Cell::new("-")],
    }
}

pub fn print_parameters(params: &ParameterVector) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Parameter").add_attribute(Attribute::Bold),
        Cell::new("Value"),
        Cell::new("Range"),
    ]);
    for p in Parameter::iter() {
        let spec = p.spec();
        table.add_row(vec![
            Cell::new(p.to_string()),
            Cell::new(p.format_value(params.get(p))).fg(Color::Cyan),
            Cell::new(format!("[{}, {}]", p.format_value(spec.low), p.format_value(spec.high))),
        ]);
    }
    align_right(&mut table, 1..=2);
    println!("\n{}", table);
}

pub fn print_logbook(logbook: &[GenerationStats]) {
    let mut table = new_table();
    table.set_header(vec!["gen", "evals", "min", "avg", "std", "max"]);
    for s in logbook {
        table.add_row(vec![
            Cell::new(s.generation),
            Cell::new(s.evaluations),
            Cell::new(format!("{:.4}", s.min)).fg(Color::Green),
            Cell::new(format!("{:.4}", s.avg)),
            Cell::new(format!("{:.4}", s.std)),
            Cell::new(format!("{:.4}", s.max)),
        ]);
    }
    align_right(&mut table, 0..=5);
    println!("\n{}", table);
}

pub fn print_train_summary(summary: &TrainSummary) {
    println!("\n🏁 Finished part {} ({} cached results)", summary.part, summary.cached);
    if let Some((params, result)) = &summary.best {
        println!("   Best individual: {}", params);
        println!("   (RMSE, CompRatio) = ({:.4}, {:.6})", result.rmse, result.ratio);
    }
    if let Some(avg) = summary.session.average_seconds() {
        println!("   Avg running time this run: {:.1}s", avg);
    }
    if let Some(avg) = summary.overall.average_seconds() {
        println!("   Total avg running time: {:.1}s", avg);
    }
    if summary.stopped_early {
        println!("   ⚠️  Search was stopped early");
    }
}

pub fn print_validation(part: usize, rows: &[ValidationRow]) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new(format!("Part {}", part)).add_attribute(Attribute::Bold),
        Cell::new("Parameters"),
        Cell::new("Train RMSE"),
        Cell::new("Train Ratio"),
        Cell::new("Valid RMSE").fg(Color::Cyan),
        Cell::new("Valid Ratio").fg(Color::Cyan),
    ]);
    for row in rows {
        let [tr, tq] = result_cells(row.training.as_ref());
        let [vr, vq] = result_cells(Some(&row.validation));
        table.add_row(vec![
            Cell::new(row.label).add_attribute(Attribute::Bold),
            Cell::new(row.params.to_string()),
            tr,
            tq,
            vr,
            vq,
        ]);
    }
    align_right(&mut table, 2..=5);
    println!("\n{}", table);
}

pub fn print_campaign(reports: &[CampaignReport]) {
    let mut table = new_table();
    table.set_header(vec!["Type", "Part", "Time", "Best (train)", "Valid RMSE", "Valid Ratio"]);
    for r in reports {
        let best = r
            .training
            .as_ref()
            .and_then(|t| t.best)
            .map(|(p, _)| p.to_string())
            .unwrap_or_else(|| "-".into());
        let validated = r
            .validation
            .as_ref()
            .and_then(|rows| rows.iter().find(|row| row.label == "best"))
            .map(|row| row.validation);
        let [vr, vq] = result_cells(validated.as_ref());
        table.add_row(vec![
            Cell::new(&r.ship_type),
            Cell::new(r.part),
            Cell::new(format!("{:.0}s", r.elapsed.as_secs_f64())),
            Cell::new(best),
            vr,
            vq,
        ]);
    }
    align_right(&mut table, 1..=2);
    println!("\n{}", table);
}

pub fn print_fold_summary(summary: &FoldSummary) {
    let mut table = new_table();
    table.set_header(vec!["Part", "Winner", "RMSE", "Ratio"]);
    for (part, params, result) in &summary.winners {
        let [r, q] = result_cells(Some(result));
        let name = Cell::new(params.to_string());
        let name = if *params == summary.best {
            name.fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            name
        };
        table.add_row(vec![Cell::new(part), name, r, q]);
    }
    println!("\n{}", table);
    println!("🏆 Best: {} (score {:.4})", summary.best, summary.best_score);

    let mut spread = new_table();
    spread.set_header(vec!["Parameter", "Mean", "Std"]);
    for p in Parameter::iter() {
        spread.add_row(vec![
            Cell::new(p.to_string()),
            Cell::new(format!("{:.2}", summary.mean[p.index()])),
            Cell::new(format!("{:.2}", summary.std[p.index()])),
        ]);
    }
    align_right(&mut spread, 1..=2);
    println!("{}", spread);
}

pub fn print_bounds(grid: &HyperGrid, cells: &[BoundsCell]) {
    let mut table = new_table();
    let mut header = vec![Cell::new("x \\ n").add_attribute(Attribute::Bold)];
    header.extend(grid.ns.iter().map(|n| Cell::new(format!("{:.2}", n))));
    table.set_header(header);

    for &x in &grid.xs {
        let mut row = vec![Cell::new(format!("{:.0}", x))];
        for &n in &grid.ns {
            let cell = match cells.iter().find(|c| c.x == x && c.n == n) {
                Some(c) if c.satisfied => Cell::new("True").fg(Color::Green),
                Some(_) => Cell::new("False").fg(Color::Red),
                None => Cell::new("-"),
            };
            row.push(cell.set_alignment(CellAlignment::Center));
        }
        table.add_row(row);
    }
    println!("\n{}", table);
}

pub fn print_sweep(cells: &[SweepCell]) {
    let mut table = new_table();
    table.set_header(vec!["x", "n", "Best", "Fitness"]);
    for c in cells {
        let (best, fit) = match &c.best {
            Some((p, f)) => (p.to_string(), format!("{:.4}", f)),
            None => ("-".into(), "-".into()),
        };
        table.add_row(vec![
            Cell::new(format!("{:.0}", c.x)),
            Cell::new(format!("{:.2}", c.n)),
            Cell::new(best),
            Cell::new(fit),
        ]);
    }
    align_right(&mut table, 3..=3);
    println!("\n{}", table);
}

pub fn print_segments(segments: &[SegmentReport]) {
    let mut table = new_table();
    table.set_header(vec!["Segment", "Evaluated", "Time", "Best", "RMSE", "Ratio"]);
    for s in segments {
        let [r, q] = result_cells(s.best.as_ref().map(|(_, r)| r));
        table.add_row(vec![
            Cell::new(&s.segment),
            Cell::new(s.evaluated),
            Cell::new(format!("{:.0}s", s.elapsed.as_secs_f64())),
            Cell::new(
                s.best
                    .as_ref()
                    .map(|(p, _)| p.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            r,
            q,
        ]);
    }
    align_right(&mut table, 1..=2);
    println!("\n{}", table);
}

pub fn print_online_eval(rows: &[OnlineEvalRow]) {
    let mut table = new_table();
    table.set_header(vec!["Trained on", "Evaluated on", "Parameters", "RMSE", "Ratio"]);
    for row in rows {
        let [r, q] = result_cells(Some(&row.result));
        table.add_row(vec![
            Cell::new(&row.trained_on),
            Cell::new(&row.evaluated_on),
            Cell::new(row.params.to_string()),
            r,
            q,
        ]);
    }
    align_right(&mut table, 3..=4);
    println!("\n{}", table);
}

pub fn print_type_exports(exports: &[TypeExport]) {
    let mut table = new_table();
    table.set_header(vec!["Type", "Name", "Parameters", "Records", "Noiseless"]);
    for e in exports {
        let params = if e.tuned {
            e.params.to_string()
        } else {
            format!("{} (defaults)", e.params)
        };
        table.add_row(vec![
            Cell::new(&e.ship_type),
            Cell::new(ship_type_name(&e.ship_type).unwrap_or("-")),
            Cell::new(params),
            Cell::new(e.records),
            Cell::new(e.noiseless),
        ]);
    }
    align_right(&mut table, 3..=4);
    println!("\n{}", table);
}
