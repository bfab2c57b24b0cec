mod debug_report;

use std::io::{self, IsTerminal, Read};
use std::time::Duration;
use terraced::{Options, RuleBook, SearchQuality, default_rules, parse_rule_line, parse_rules, run, tokenize};
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "TERRACED_DEBUG";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    init_tracing();

    let rules = match load_rules(&config) {
        Ok(rules) => rules,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let input = tokenize(&config.input);
    match run(&rules, &input, &config.options) {
        Ok(res) => debug_report::print_run(&input, &rules, &res, config.color),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

struct CliConfig {
    input: String,
    options: Options,
    rule_files: Vec<String>,
    rule_lines: Vec<String>,
    color: bool,
}

/// Install a stderr subscriber when `TERRACED_DEBUG` is set. `RUST_LOG`
/// overrides the default filter.
fn init_tracing() {
    if std::env::var_os(DEBUG_ENV).is_none() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("terraced=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn load_rules(config: &CliConfig) -> Result<RuleBook, terraced::Error> {
    if config.rule_files.is_empty() && config.rule_lines.is_empty() {
        return Ok(default_rules().clone());
    }

    let mut rules = RuleBook::new();
    for path in &config.rule_files {
        let text = std::fs::read_to_string(path)?;
        rules.extend(parse_rules(&text, path)?.iter().map(|(_, rule)| rule.clone()));
    }
    for (idx, line) in config.rule_lines.iter().enumerate() {
        if let Some(rule) = parse_rule_line(line, idx + 1, "--rule")? {
            rules.add(rule);
        }
    }
    rules.validate()?;
    Ok(rules)
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<String> = None;
    let mut options = Options::default();
    let mut rule_files = Vec::new();
    let mut rule_lines = Vec::new();
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1).peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("terraced {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--fast" => options.quality = SearchQuality::Fast,
            "--first" => options.stop_at_first = true,
            "--seed" => {
                let value = args.next().ok_or_else(|| "error: --seed expects a value".to_string())?;
                options.seed = Some(parse_number(&value, "--seed")?);
            }
            "--steps" => {
                let value = args.next().ok_or_else(|| "error: --steps expects a value".to_string())?;
                options.max_steps = parse_steps(&value)?;
            }
            "--timeout-ms" => {
                let value = args.next().ok_or_else(|| "error: --timeout-ms expects a value".to_string())?;
                options.time_budget = Some(Duration::from_millis(parse_number(&value, "--timeout-ms")?));
            }
            "--rules" => {
                let value = args.next().ok_or_else(|| "error: --rules expects a file".to_string())?;
                rule_files.push(value);
            }
            "--rule" => {
                let value = args.next().ok_or_else(|| "error: --rule expects a rule line".to_string())?;
                rule_lines.push(value);
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with("--seed=") => {
                options.seed = Some(parse_number(arg.trim_start_matches("--seed="), "--seed")?);
            }
            _ if arg.starts_with("--steps=") => {
                options.max_steps = parse_steps(arg.trim_start_matches("--steps="))?;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                input = Some(rest);
                break;
            }
        }
    }

    let input = match input {
        Some(value) => value,
        None => read_stdin_input()?,
    };

    if input.trim().is_empty() {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    }

    Ok(CliConfig { input, options, rule_files, rule_lines, color })
}

fn parse_number(value: &str, flag: &str) -> Result<u64, String> {
    value.parse().map_err(|_| format!("error: invalid {flag} '{value}' (expected a non-negative integer)"))
}

/// `0` means unlimited.
fn parse_steps(value: &str) -> Result<Option<usize>, String> {
    let steps = parse_number(value, "--steps")? as usize;
    Ok((steps > 0).then_some(steps))
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "terraced {version}

Salience-driven rule engine CLI.

Usage:
  terraced [OPTIONS] [--] <input...>

Input is read from the remaining arguments, or from stdin when none are given.

Options:
  --rules <file>             Load rules from a file (repeatable). Replaces the
                             built-in rule set.
  --rule <line>              Add one rule, e.g. 'greet: hello *x => hi *x'
                             (repeatable).
  --seed <n>                 Seed the coderack for a reproducible run.
  --steps <n>                Step budget. 0 means unlimited. Default: {steps}
  --timeout-ms <n>           Wall-clock budget for the search.
  --fast                     Round-robin draws instead of weighted draws.
  --first                    Stop at the first outcome.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  {debug_env}=1           Trace engine activity to stderr (filter with RUST_LOG).

Exit codes:
  0  Success.
  1  Internal error.
  2  Invalid arguments, rules or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        steps = Options::default().max_steps.unwrap_or(0),
        debug_env = DEBUG_ENV,
    )
}
