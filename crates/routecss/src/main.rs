mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use routecssc::ast::{ReturnKind, StatusSpec, Stylesheet};
use routecssc::diag::{Diag, has_errors};
use routecssc::http::{ServeConfig, serve};
use routecssc::{App, load_file};

use crate::manifest::Project;

#[derive(Debug, Parser)]
#[command(name = "routecss", version, about = "Serve HTTP APIs declared in CSS-shaped stylesheets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the stylesheet and serve its routes
    Run {
        /// Stylesheet path (defaults to package.entry)
        file: Option<PathBuf>,
        /// Path to routecss.toml or its directory
        #[arg(long)]
        manifest_path: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Parse the stylesheet and report diagnostics
    Check {
        file: Option<PathBuf>,
        #[arg(long)]
        manifest_path: Option<PathBuf>,
        /// Print the loaded route table
        #[arg(long)]
        dump: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run {
            file,
            manifest_path,
            host,
            port,
        } => run(file.as_deref(), manifest_path.as_deref(), host, port),
        Command::Check {
            file,
            manifest_path,
            dump,
        } => check(file.as_deref(), manifest_path.as_deref(), dump),
    };
    if let Err(message) = result {
        eprintln!("error: {message}");
        process::exit(1);
    }
}

fn load_project(manifest_path: Option<&Path>) -> Result<Project, String> {
    let project = Project::load(manifest_path).map_err(|err| err.to_string())?;
    project.apply_dotenv();
    routecss_rt::log::init();
    Ok(project)
}

fn load_sheet(project: &Project, file: Option<&Path>) -> Result<Stylesheet, String> {
    let path = project.resolve_entry(file).map_err(|err| err.to_string())?;
    let (sheet, diags) = load_file(&path).map_err(|err| err.to_string())?;
    report_diags(&path, &diags);
    if has_errors(&diags) {
        return Err(format!("{} has errors", path.display()));
    }
    Ok(sheet)
}

fn report_diags(path: &Path, diags: &[Diag]) {
    for diag in diags {
        eprintln!("{}: {diag}", path.display());
    }
}

fn run(
    file: Option<&Path>,
    manifest_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), String> {
    let project = load_project(manifest_path)?;
    let sheet = load_sheet(&project, file)?;
    let config = ServeConfig {
        host: host.unwrap_or_else(|| project.host()),
        port: match port {
            Some(port) => port,
            None => project.port().map_err(|err| err.to_string())?,
        },
        max_requests: project.max_requests().map_err(|err| err.to_string())?,
        ..ServeConfig::default()
    };
    let db_url = project.database_url();
    let app = App::from_stylesheet(sheet, db_url.as_deref()).map_err(|err| err.to_string())?;
    serve(&app, &config).map_err(|err| err.to_string())
}

fn check(file: Option<&Path>, manifest_path: Option<&Path>, dump: bool) -> Result<(), String> {
    let project = load_project(manifest_path)?;
    let sheet = load_sheet(&project, file)?;
    if dump {
        print_routes(&sheet);
    } else {
        println!("ok: {} route(s)", sheet.routes.len());
    }
    Ok(())
}

fn print_routes(sheet: &Stylesheet) {
    if let Some(url) = &sheet.database {
        println!("@database {url}");
    }
    for route in &sheet.routes {
        let status = match &route.status {
            None => "200".to_string(),
            Some(StatusSpec::Literal(code)) => code.to_string(),
            Some(StatusSpec::Var(name)) => format!("var(--{name})"),
            Some(StatusSpec::Conditional(_)) => "if(...)".to_string(),
        };
        let kind = match route.ret.kind {
            ReturnKind::Json => "json",
            ReturnKind::Html => "html",
        };
        let vars: Vec<String> = route
            .assignments
            .iter()
            .map(|a| format!("--{}", a.name))
            .collect();
        println!(
            "{} {} status={status} return={kind} vars=[{}]",
            route.method,
            route.path,
            vars.join(", ")
        );
    }
}

