use std::error::Error;
use std::path::Path;

use plotters::prelude::*;

use sim_lib::cpu::SimPolicy;
use sim_lib::logging;
use sim_lib::run_wrapper::run;

fn main() -> Result<(), Box<dyn Error>> {
    logging::init("warn");
    let param_tokens: Vec<String> = std::env::args().collect();
    let elf_path = param_tokens.get(1).ok_or("You should specify exactly one ELF file")?;

    // Warm-up curve: CPI over growing instruction budgets.
    // A budget past the program's length just runs it to exit.
    let budgets: Vec<u64> = (1..=6).map(|e| 10u64.pow(e)).collect();

    let mut data: Vec<(u64, f64)> = Vec::new();
    let mut y_max: f64 = 1.0;
    for budget in budgets.iter() {
        let policy = SimPolicy { max_insts: *budget, ..Default::default() };
        let stats = run(Path::new(elf_path), &policy)?.stats;
        data.push((stats.sim_num_insn.max(1), stats.cpi()));
        y_max = y_max.max(stats.cpi());
        if stats.sim_num_insn < *budget {
            break;
        }
    }

    let base_name = Path::new(elf_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| elf_path.clone());
    let plot_title = format!("CPI vs instructions: {}", base_name);
    let output_path = format!("eval/cpi_curve_{}.svg", base_name);
    let x_max = data.last().map(|(x, _)| *x).unwrap_or(10);

    let root = SVGBackend::new(output_path.as_str(), (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(plot_title.as_str(), ("sans-serif", 40).into_font())
        .margin(5)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d((1u64..x_max.max(10)).log_scale(), 0.0..y_max * 1.1)?;
    ctx.configure_mesh()
        .x_desc("Instructions executed")
        .y_desc("CPI")
        .draw()?;

    let color = Palette99::pick(0).to_rgba();
    ctx.draw_series(LineSeries::new(data.iter().copied(), color))?
        .label("pipelined")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    ctx.draw_series(data.iter().map(|point| Circle::new(*point, 3, color.filled())))?;

    ctx.configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;

    eprintln!("Wrote {}", output_path);
    Ok(())
}
