use std::env;

use tracing::info;
use tracing_subscriber::EnvFilter;
use vfs::config::{config_path_from_env, load_or_create_config};
use vfs::CatalogFs;

/// Logs in, builds the index once (when `scan_on_start` allows) and prints
/// its size. With `--tree` it also prints every directory and file of the
/// mounted view.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let tree = env::args().skip(1).any(|arg| arg == "--tree");
    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}; fill in the credentials", config_path);
        return Ok(());
    }
    info!("Loaded config from {:?}", config_path);

    let fs = CatalogFs::from_config(&config)?;
    let Some(stats) = fs.start()? else {
        println!("Initial scan disabled (scan_on_start: false); nothing indexed");
        return Ok(());
    };
    println!(
        "Indexed: {} artists, {} albums, {} tracks, {} playlists",
        stats.artists, stats.albums, stats.tracks, stats.playlists
    );

    if tree {
        print_tree(&fs, "/", 0)?;
    }
    Ok(())
}

fn print_tree(fs: &CatalogFs, path: &str, depth: usize) -> Result<(), vfs::VfsError> {
    for name in fs.readdir(path)? {
        if name == "." || name == ".." {
            continue;
        }
        let child = if path == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", path, name)
        };
        let stat = fs.getattr(&child)?;
        match stat.kind {
            vfs::FileKind::Directory => {
                println!("{}{}/", "  ".repeat(depth), name);
                print_tree(fs, &child, depth + 1)?;
            }
            vfs::FileKind::File => println!("{}{} ({} bytes)", "  ".repeat(depth), name, stat.size),
        }
    }
    Ok(())
}
