use anyhow::Context;
use clap::{Parser, Subcommand};
use efs_vault::config::{KdfParams, DEFAULT_M_COST_KIB, DEFAULT_PARALLELISM, DEFAULT_T_COST};
use efs_vault::{bulk, engine, gc};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "efs-vault", version, about = "Encrypted file vault")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Initialize a new vault repository
    Init {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
        #[arg(long, default_value_t = DEFAULT_T_COST)]
        t_cost: u32,
        #[arg(long, default_value_t = DEFAULT_M_COST_KIB)]
        m_cost_kib: u32,
        #[arg(long, default_value_t = DEFAULT_PARALLELISM)]
        parallelism: u32,
        #[arg(long)]
        force: bool,
    },

    /// List files in the vault
    Ls {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
    },

    /// Add a file to the vault
    Add {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
        path: PathBuf,
        #[arg(long)]
        relpath: Option<String>,
    },

    /// Extract a file by id
    Extract {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
        id: String,
        out: PathBuf,
    },

    /// Replace a file's content by id
    Update {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
        id: String,
        path: PathBuf,
    },

    /// Rename a file entry by id
    Rename {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
        id: String,
        new_name: String,
    },

    /// Remove a file by id
    Remove {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
        id: String,
    },

    /// Rotate the master key, optionally under a new passphrase
    RotateMaster {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
        #[arg(long)]
        new_passphrase: Option<String>,
    },

    /// Add every file under a directory in one batch commit
    BulkAdd {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
        folder: PathBuf,
    },

    /// Remove many files by id in one batch commit
    BulkRemove {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
        ids: Vec<String>,
    },

    /// Delete blobs with no matching catalog entry
    Gc {
        repo: PathBuf,
        #[arg(long)]
        passphrase: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Init {
            repo,
            passphrase,
            t_cost,
            m_cost_kib,
            parallelism,
            force,
        } => {
            let params = KdfParams {
                t_cost,
                m_cost_kib,
                parallelism,
            };
            engine::init(&repo, &passphrase, params, force)
                .with_context(|| format!("init {}", repo.display()))?;
            info!(repo = %repo.display(), "initialized vault");
            println!("Initialized vault at {}", repo.display());
        }

        Cmd::Ls { repo, passphrase } => {
            let unlocked =
                engine::unlock(&repo, &passphrase).with_context(|| "unlock failed")?;
            if unlocked.catalog.files.is_empty() {
                println!("(empty)");
            }
            for f in &unlocked.catalog.files {
                println!("{}\t{}\t{} bytes\t{}", f.id, f.relpath, f.size, f.blob);
            }
        }

        Cmd::Add {
            repo,
            passphrase,
            path,
            relpath,
        } => {
            let id = engine::add(&repo, &passphrase, &path, relpath)
                .with_context(|| format!("add {}", path.display()))?;
            println!("added id={id}");
        }

        Cmd::Extract {
            repo,
            passphrase,
            id,
            out,
        } => {
            engine::extract(&repo, &passphrase, &id, &out)
                .with_context(|| format!("extract id={id} -> {}", out.display()))?;
            println!("extracted to {}", out.display());
        }

        Cmd::Update {
            repo,
            passphrase,
            id,
            path,
        } => {
            let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            engine::update(&repo, &passphrase, &id, &bytes)
                .with_context(|| format!("update id={id}"))?;
            println!("updated id={id}");
        }

        Cmd::Rename {
            repo,
            passphrase,
            id,
            new_name,
        } => {
            engine::rename(&repo, &passphrase, &id, &new_name)
                .with_context(|| format!("rename id={id}"))?;
            println!("renamed id={id} -> {new_name}");
        }

        Cmd::Remove {
            repo,
            passphrase,
            id,
        } => {
            engine::remove(&repo, &passphrase, &id).with_context(|| format!("remove id={id}"))?;
            println!("removed id={id}");
        }

        Cmd::RotateMaster {
            repo,
            passphrase,
            new_passphrase,
        } => {
            engine::rotate_master(&repo, &passphrase, new_passphrase.as_deref(), None)
                .with_context(|| "rotate master key")?;
            println!("master key rotated");
        }

        Cmd::BulkAdd {
            repo,
            passphrase,
            folder,
        } => {
            let tasks = collect_add_tasks(&folder)?;
            let report = bulk::bulk_add(&repo, &passphrase, tasks, None)
                .with_context(|| format!("bulk add {}", folder.display()))?;
            if report.cancelled {
                println!("cancelled; no entries committed");
            } else {
                println!("added {} files", report.added_ids.len());
            }
            for (path, msg) in &report.failures {
                eprintln!("failed: {} ({msg})", path.display());
            }
        }

        Cmd::BulkRemove {
            repo,
            passphrase,
            ids,
        } => {
            let report = bulk::bulk_remove(&repo, &passphrase, &ids)
                .with_context(|| "bulk remove")?;
            println!("removed {} files", report.removed_ids.len());
            for id in &report.not_found {
                eprintln!("not found: {id}");
            }
            for (id, msg) in &report.failures {
                eprintln!("failed: {id} ({msg})");
            }
        }

        Cmd::Gc { repo, passphrase } => {
            let removed = gc::gc(&repo, &passphrase).with_context(|| "gc")?;
            println!("removed {} orphan blobs", removed.len());
        }
    }

    Ok(())
}

fn collect_add_tasks(folder: &std::path::Path) -> anyhow::Result<Vec<bulk::AddTask>> {
    let mut tasks = Vec::new();
    for entry in walkdir::WalkDir::new(folder) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let relpath = path
            .strip_prefix(folder)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        tasks.push(bulk::AddTask {
            source_path: path,
            relpath,
        });
    }
    Ok(tasks)
}
