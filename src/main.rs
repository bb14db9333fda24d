use std::fs;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "md2docx")]
#[command(about = "Convert Markdown files to Word documents")]
struct Cli {
    /// Input Markdown file
    input: PathBuf,

    /// Output .docx file (defaults to input name with .docx extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Template .docx whose styles, headers and footers are reused
    #[arg(long)]
    template: Option<PathBuf>,

    /// Style configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Template variable, may be repeated
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// JSON object of template variables
    #[arg(long = "vars", value_name = "FILE")]
    vars_file: Option<PathBuf>,
}

fn parse_var(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", arg)),
    }
}

fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match md2docx::Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => md2docx::Config::compiled_default(),
    };

    // Variables: config file, then --vars, then --var
    if let Some(path) = &cli.vars_file {
        let json = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                std::process::exit(1);
            }
        };
        match md2docx::variables_from_json(&json) {
            Ok(vars) => config.variables.extend(vars),
            Err(e) => {
                eprintln!("Error in {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }
    config.variables.extend(cli.vars);

    let output = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension("docx"));

    if let Err(e) =
        md2docx::convert_file(&cli.input, &output, cli.template.as_deref(), &config)
    {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    println!("Created {}", output.display());
}
