use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing::info;

use galerie::{logging, Config, ContainerRef, Photo, Session, SortOrder};

struct Args {
    config_path: Option<PathBuf>,
    order: Option<SortOrder>,
    plan_only: bool,
    target: ContainerRef,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut order = None;
    let mut plan_only = false;
    let mut target = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("galerie {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--config requires a path argument"))?;
                config_path = Some(PathBuf::from(path));
                i += 1;
            }
            "--order" | "-o" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--order requires asc or desc"))?;
                order = Some(value.parse()?);
                i += 1;
            }
            "--plan" => {
                plan_only = true;
            }
            arg if arg.starts_with('-') => {
                print_help();
                return Err(anyhow!("Unknown argument: {}", arg));
            }
            arg => {
                if target.is_some() {
                    return Err(anyhow!("Only one container can be listed at a time"));
                }
                target = Some(arg.parse()?);
            }
        }
        i += 1;
    }

    let target = target.ok_or_else(|| {
        print_help();
        anyhow!("Missing TARGET")
    })?;

    Ok(Args {
        config_path,
        order,
        plan_only,
        target,
    })
}

fn print_help() {
    println!(
        r#"galerie - browse a remote photo gallery

USAGE:
    galerie [OPTIONS] TARGET

TARGET:
    directory:ID | gallery:ID | place:ID | face:ID | favorites | search:QUERY

OPTIONS:
    --order, -o asc|desc  Sort order (default from config, desc otherwise)
    --plan                Show the container and chunk size, then exit
    --config, -c PATH     Path to config file
    --version, -V         Show version
    --help, -h            Show this help message

ENVIRONMENT:
    GALERIE_CONFIG        Path to config file (overrides default location)
    GALERIE_LOG           Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/galerie/config.toml"#
    );
}

fn print_photo(photo: &Photo) {
    let kind = if photo.is_video { "  [video]" } else { "" };
    println!(
        "{}  {:>8}  {}{}",
        photo.timestamp.format("%Y-%m-%d %H:%M:%S"),
        photo.id,
        photo.name,
        kind
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;

    let _ = logging::init(None);

    let config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let order = args.order.unwrap_or(config.loader.sort_order);

    let session = Session::open(&config);
    let loader = session.loader(args.target.clone(), order).await?;

    let container = loader.container();
    println!(
        "# {}: {} photos, {} .. {}, {} per request",
        args.target,
        container.number_of_photos,
        container.min_date.map(|d| d.to_string()).unwrap_or_else(|| "?".into()),
        container.max_date.map(|d| d.to_string()).unwrap_or_else(|| "?".into()),
        loader.chunk_description()
    );

    if args.plan_only {
        session.close();
        return Ok(());
    }

    let mut printed = 0;
    loader.load_initial().await;
    loop {
        // Windows are walked in sort order, so new photos always land after the printed ones.
        let photos = loader.photos();
        for photo in photos.iter().skip(printed) {
            print_photo(photo);
        }
        printed = photos.len();

        if !loader.should_load_more() {
            break;
        }
        loader.load_more().await;
    }

    let error = loader.error();
    info!("Listed {} photos from {}", printed, args.target);
    session.close();

    match error {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}
