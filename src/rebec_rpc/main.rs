use clap::Parser;
use colored::*;
use directories::ProjectDirs;
use rebec_rpc::commands::config::{ConfigAction, Setting};
use rebec_rpc::commands::{self, CmdResult, Notice};
use rebec_rpc::config::{parse_header_arg, ConfigPaths, RpcConfig, Scope, PROJECT_DIR};
use rebec_rpc::descriptor::{DescriptorPool, MessageDescriptor, ServiceDescriptor};
use rebec_rpc::error::{Direction, Result, RpcError};
use rebec_rpc::Protocol;
use serde_json::Value;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod args;
use args::{Cli, Commands, DataArgs};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

struct AppContext {
    paths: ConfigPaths,
    scope: Scope,
    /// File config with flag overrides applied.
    config: RpcConfig,
    file_config: RpcConfig,
    overrides: Overrides,
    compact: bool,
}

/// Global flags that override configuration values.
#[derive(Debug, Clone)]
struct Overrides {
    base_url: Option<String>,
    protocol: Option<Protocol>,
    service: Option<String>,
    schema: Option<PathBuf>,
    timeout_ms: Option<u64>,
    headers: Vec<String>,
}

impl Overrides {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            base_url: cli.base_url.clone(),
            protocol: cli.protocol,
            service: cli.service.clone(),
            schema: cli.schema.clone(),
            timeout_ms: cli.timeout_ms,
            headers: cli.headers.clone(),
        }
    }

    fn apply(&self, config: &mut RpcConfig) -> Result<()> {
        if let Some(url) = &self.base_url {
            config.base_url = Some(url.clone());
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(service) = &self.service {
            config.service = service.clone();
        }
        if let Some(schema) = &self.schema {
            config.schema = Some(schema.clone());
        }
        if let Some(timeout) = self.timeout_ms {
            config.timeout_ms = timeout;
        }
        for raw in &self.headers {
            let (name, value) = parse_header_arg(raw)?;
            config.headers.insert(name, value);
        }
        Ok(())
    }
}

impl AppContext {
    /// Config for building a client: file, then environment, then flags.
    fn client_config(&self) -> Result<RpcConfig> {
        let mut config = self.file_config.clone();
        config.apply_env()?;
        self.overrides.apply(&mut config)?;
        Ok(config)
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = init_context(&cli)?;

    match cli.command {
        Commands::Call { method, data } => handle_call(&ctx, &method, &data),
        Commands::Check {
            method,
            data,
            response,
        } => handle_check(&ctx, &method, &data, response),
        Commands::Methods => handle_methods(&ctx),
        Commands::Describe { type_name } => handle_describe(&ctx, &type_name),
        Commands::Config { key, value, unset } => handle_config(&ctx, key, value, unset),
        Commands::Init => handle_init(&ctx, cli.base_url.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn init_context(cli: &Cli) -> Result<AppContext> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let project_dir = cwd.join(PROJECT_DIR);

    let proj_dirs = ProjectDirs::from("com", "rebec", "rebec-rpc")
        .ok_or_else(|| RpcError::Config("Could not determine config dir".to_string()))?;
    let global_dir = proj_dirs.config_dir().to_path_buf();

    let scope = if cli.global {
        Scope::Global
    } else {
        Scope::Project
    };

    // Without -g, a missing project config falls back to the global one.
    let config_dir = match scope {
        Scope::Project if RpcConfig::exists(&project_dir) => &project_dir,
        _ => &global_dir,
    };
    let file_config = RpcConfig::load(config_dir)?;
    let overrides = Overrides::from_cli(cli);
    let mut config = file_config.clone();
    overrides.apply(&mut config)?;

    Ok(AppContext {
        paths: ConfigPaths {
            project: Some(project_dir),
            global: global_dir,
        },
        scope,
        config,
        file_config,
        overrides,
        compact: cli.compact,
    })
}

fn read_document(data: &DataArgs) -> Result<Value> {
    let text = match (&data.data, &data.data_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .map_err(|e| RpcError::Config(format!("cannot read {}: {}", path.display(), e)))?,
        (None, Some(_)) => read_stdin()?,
        (None, None) if std::io::stdin().is_terminal() => "{}".to_string(),
        (None, None) => read_stdin()?,
    };
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&text)
        .map_err(|e| RpcError::Config(format!("request document is not valid JSON: {}", e)))
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn pool(ctx: &AppContext) -> Result<Arc<DescriptorPool>> {
    ctx.config.descriptor_pool()
}

fn handle_call(ctx: &AppContext, method: &str, data: &DataArgs) -> Result<()> {
    let request = read_document(data)?;
    let config = ctx.client_config()?;
    let pool = config.descriptor_pool()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(commands::call::run(&config, pool, method, &request))?;
    print_document(ctx, &result);
    print_notices_to_stderr(&result.notices);
    Ok(())
}

fn handle_check(ctx: &AppContext, method: &str, data: &DataArgs, response: bool) -> Result<()> {
    let document = read_document(data)?;
    let direction = if response {
        Direction::Response
    } else {
        Direction::Request
    };
    let pool = pool(ctx)?;
    let result = commands::check::run(&pool, &ctx.config.service, method, &document, direction)?;
    print_document(ctx, &result);
    print_notices_to_stderr(&result.notices);
    Ok(())
}

fn handle_methods(ctx: &AppContext) -> Result<()> {
    let result = commands::methods::run(&*pool(ctx)?)?;
    print_services(&result.services);
    print_notices(&result.notices);
    Ok(())
}

fn handle_describe(ctx: &AppContext, type_name: &str) -> Result<()> {
    let result = commands::describe::run(&*pool(ctx)?, type_name)?;
    if let Some(message) = &result.message_type {
        print_message_type(message);
    }
    print_notices(&result.notices);
    Ok(())
}

fn handle_config(
    ctx: &AppContext,
    key: Option<String>,
    value: Option<String>,
    unset: bool,
) -> Result<()> {
    let action = match (key, value) {
        (None, _) => ConfigAction::List,
        (Some(k), _) if unset => ConfigAction::Unset(k),
        (Some(k), None) => ConfigAction::Get(k),
        (Some(k), Some(v)) => ConfigAction::Set(k, v),
    };
    let single = matches!(action, ConfigAction::Get(_));

    let result = commands::config::run(&ctx.paths, ctx.scope, action)?;
    if single {
        // Bare value, for scripts.
        for setting in &result.settings {
            println!("{}", setting.value);
        }
    } else {
        print_settings(&result.settings);
    }
    print_notices(&result.notices);
    Ok(())
}

fn handle_init(ctx: &AppContext, base_url: Option<&str>) -> Result<()> {
    let result = commands::init::run(&ctx.paths, ctx.scope, base_url)?;
    print_notices(&result.notices);
    Ok(())
}

fn print_document(ctx: &AppContext, result: &CmdResult) {
    if let Some(document) = &result.document {
        let text = if ctx.compact {
            serde_json::to_string(document)
        } else {
            serde_json::to_string_pretty(document)
        };
        match text {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("{}", format!("cannot render document: {}", e).red()),
        }
    }
}

fn print_services(services: &[Arc<ServiceDescriptor>]) {
    for service in services {
        println!("{}", service.full_name.bold());
        for method in &service.methods {
            println!(
                "  {} ({}) → {}",
                method.name.yellow(),
                method.input_type.dimmed(),
                method.output_type.dimmed()
            );
        }
    }
}

fn print_message_type(message: &MessageDescriptor) {
    println!("{}", message.full_name.bold());
    for field in &message.fields {
        let required = if field.required { " (required)" } else { "" };
        println!(
            "  {} {}{}",
            field.name.yellow(),
            field.type_label().dimmed(),
            required.red()
        );
    }
}

fn print_settings(settings: &[Setting]) {
    for setting in settings {
        let marker = if setting.is_default { " (default)" } else { "" };
        println!("{} = {}{}", setting.key, setting.value, marker.dimmed());
    }
}

fn paint(notice: &Notice) -> ColoredString {
    let text = notice.to_string();
    match notice {
        n if n.is_warning() => text.yellow(),
        Notice::Completed { .. } => text.dimmed(),
        _ => text.green(),
    }
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        println!("{}", paint(notice));
    }
}

/// Same as [`print_notices`], for commands whose stdout is a JSON document.
fn print_notices_to_stderr(notices: &[Notice]) {
    for notice in notices {
        eprintln!("{}", paint(notice));
    }
}
