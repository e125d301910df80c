mod logging;
mod models;
mod scenario;
mod simulation;

use clap::{Arg, Command};
use logging::{init_logging, level_for_verbosity, parse_log_level, LogConfig, LogOutput};
use scenario::ScenarioConfig;
use simulation::{SimulationEngine, SimulationReport};

fn main() {
    let matches = Command::new("squadsim")
        .version("0.1.0")
        .about("分隊操舵シミュレーション (Squad Steering Simulation)")
        .long_about("兵士エージェントの操舵行動シミュレーション\n\
                     隊長への追従・目標の追跡・障害物回避を固定時間刻みで再現します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
                .conflicts_with("test")
        )
        .arg(
            Arg::new("test")
                .short('t')
                .long("test")
                .action(clap::ArgAction::SetTrue)
                .help("組み込みのデモ分隊でシミュレーションを実行")
                .conflicts_with("info")
        )
        .arg(
            Arg::new("report")
                .long("report")
                .action(clap::ArgAction::SetTrue)
                .help("実行結果をYAMLで出力")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。-v より優先")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .value_parser(|s: &str| s.parse::<LogOutput>())
                .help("ログ出力先 (console, file, both)")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");
    let level = matches
        .get_one::<String>("log-level")
        .map(|s| parse_log_level(s))
        .unwrap_or_else(|| level_for_verbosity(verbose_level));
    let output = matches
        .get_one::<LogOutput>("log-output")
        .copied()
        .unwrap_or(LogOutput::Console);

    let _log_guard = match init_logging(LogConfig { level, output, ..LogConfig::default() }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    println!("分隊操舵シミュレーション (Squad Steering Simulation) - squadsim v0.1.0");
    println!();

    let print_report = matches.get_flag("report");

    let result = if matches.get_flag("test") {
        println!("=== デモ分隊モード ===");
        ScenarioConfig::demo()
            .map_err(Into::into)
            .and_then(|scenario| execute_scenario(scenario, verbose_level, print_report))
    } else if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        run_scenario(scenario_path, matches.get_flag("info"), verbose_level, print_report)
    } else {
        show_default_help();
        Ok(())
    };

    if let Err(e) = result {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// シナリオファイルを読み込んで実行
fn run_scenario(
    scenario_path: &str,
    info_only: bool,
    verbose_level: u8,
    print_report: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = ScenarioConfig::from_file(scenario_path)?;

    if verbose_level > 0 {
        println!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    execute_scenario(scenario, verbose_level, print_report)
}

/// シナリオの実行
fn execute_scenario(
    scenario: ScenarioConfig,
    verbose_level: u8,
    print_report: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    simulation.initialize()?;
    simulation.run()?;

    let report = simulation.report();
    if print_report {
        println!("{}", serde_yaml::to_string(&report)?);
    } else {
        print_report_summary(&report);
    }

    Ok(())
}

fn print_report_summary(report: &SimulationReport) {
    println!("=== 実行結果 ===");
    println!("シナリオ: {}", report.scenario);
    println!("経過時間: {:.1}秒 ({}ステップ)", report.simulated_time_s, report.steps);
    for soldier in &report.soldiers {
        println!(
            "  {}: 位置 ({:.1}, {:.1}, {:.1}) 行動 {:?} 目標 {} (追従 {} / 追跡 {} フレーム, 最高速度 {:.2})",
            soldier.id,
            soldier.final_position.x,
            soldier.final_position.y,
            soldier.final_position.z,
            soldier.behavior,
            soldier.target.as_deref().unwrap_or("-"),
            soldier.stats.frames_following,
            soldier.stats.frames_pursuing,
            soldier.stats.max_speed_observed,
        );
    }
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  squadsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>   シナリオファイルを指定して実行");
    println!("  -i, --info              シナリオ情報のみ表示");
    println!("  -t, --test              デモ分隊で実行");
    println!("      --report            実行結果をYAMLで出力");
    println!("  -v, --verbose           詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-level <LEVEL> ログレベルを指定");
    println!("      --log-output <TO>   ログ出力先 (console, file, both)");
    println!("  -h, --help              このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/squad_demo.yaml - 隊長追従と敵兵追跡のデモ");
    println!();
    println!("例:");
    println!("  squadsim -s scenarios/squad_demo.yaml -v");
    println!("  squadsim -s scenarios/squad_demo.yaml --report");
    println!("  squadsim --test --log-output both");
}
