use clap::ArgMatches;
use forecast_windows::{
    config::{build_cli, PrepConfig},
    dataset::Dataset,
    extract_inputs_targets_forcings, extract_inputs_targets_forcings_climate,
    lead_times::{LeadTimeSelection, TargetLeadTimes},
    time_utils::format_timedelta,
    WindowMode,
};
use log::info;

fn main() {
    let matches = build_cli().get_matches();

    let default_filter = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match matches.subcommand() {
        Some(("lead-times", sub_matches)) => {
            if let Err(e) = run_lead_times(sub_matches) {
                eprintln!("Lead time error: {}", e);
                std::process::exit(1);
            }
        }
        Some(("synthetic", sub_matches)) => {
            if let Err(e) = run_synthetic(sub_matches) {
                eprintln!("Extraction error: {}", e);
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("Please specify a subcommand. Use --help for more information.");
            std::process::exit(1);
        }
    }
}

fn run_lead_times(matches: &ArgMatches) -> Result<(), String> {
    let text = matches
        .get_one::<String>("lead_times")
        .ok_or("Missing lead time specification")?;
    let lead_times: TargetLeadTimes = text.parse().map_err(|e| format!("{}", e))?;
    let normalized = lead_times.normalize().map_err(|e| e.to_string())?;

    match &normalized.selection {
        LeadTimeSelection::Labels(labels) => {
            let labels: Vec<String> = labels.iter().map(|t| format_timedelta(*t)).collect();
            println!("Lead times:      {}", labels.join(", "));
        }
        LeadTimeSelection::Range { start, stop, step } => {
            println!(
                "Lead time range: {} ..= {}",
                format_timedelta(*start),
                format_timedelta(*stop)
            );
            if let Some(step) = step {
                println!("Step:            {}", format_timedelta(*step));
            }
        }
    }
    println!("Target duration: {}", format_timedelta(normalized.target_duration));
    Ok(())
}

fn run_synthetic(matches: &ArgMatches) -> Result<(), String> {
    let config = PrepConfig::from_matches(matches)?;
    let data = config.grid.build().map_err(|e| e.to_string())?;
    info!(
        "Built synthetic dataset: {} variables, {} timesteps",
        data.data_vars().len(),
        data.time_len()
    );

    let request = config.to_request();
    let solar = config.solar();
    let windowed = match config.mode {
        WindowMode::Duration => {
            extract_inputs_targets_forcings(&data, &request, &solar, WindowMode::Duration)
        }
        WindowMode::Climate => extract_inputs_targets_forcings_climate(&data, &request, &solar),
    }
    .map_err(|e| {
        let kind = if e.is_precondition() {
            "invalid request"
        } else if e.is_consistency_violation() {
            "inconsistent data"
        } else {
            "dataset"
        };
        format!("{} ({})", e, kind)
    })?;

    print_dataset("inputs", &windowed.inputs);
    print_dataset("targets", &windowed.targets);
    print_dataset("forcings", &windowed.forcings);
    Ok(())
}

fn print_dataset(label: &str, data: &Dataset) {
    let time: Vec<String> = data
        .time()
        .map(|t| t.iter().map(|d| format_timedelta(*d)).collect())
        .unwrap_or_default();
    println!("\n=== {} ===", label);
    println!("time: [{}]", time.join(", "));
    for (name, var) in data.data_vars() {
        println!(
            "  {:<32} {:<40} {:?}{}",
            name,
            format!("({})", var.dims.join(", ")),
            var.shape(),
            if var.data.is_deferred() { "  deferred" } else { "" }
        );
    }
}
