use anyhow::{Context, Result};
use callgrid_core::Analysis;
use callgrid_graph::{GraphModel, GridLayouter, Layouter};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless call graph analysis and grid layout", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze every Rust file under a directory (or a single file)
    Analyze {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print full analyses as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Print the grid layout of one file as JSON
    Layout { file: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Analyze { path, json } => {
            let files = discover(&path)?;
            tracing::info!("Found {} Rust files under {:?}", files.len(), path);
            let results = analyze_all(&files);
            if json {
                let analyses: Vec<&Analysis> = results.iter().filter_map(|(_, r)| r.as_ref().ok()).collect();
                println!("{}", serde_json::to_string_pretty(&analyses)?);
            } else {
                print!("{}", summarize(&results));
            }
        }
        Command::Layout { file } => {
            let layout = layout_file(&file)?;
            println!("{}", serde_json::to_string_pretty(&layout)?);
        }
    }
    Ok(())
}

/// `.rs` files under `root`, honoring ignore files, in path order.
fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    anyhow::ensure!(root.exists(), "{} does not exist", root.display());

    let walker = ignore::WalkBuilder::new(root).standard_filters(true).build();
    let mut files = Vec::new();
    for result in walker {
        match result {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().is_some_and(|ft| ft.is_file())
                    && path.extension().is_some_and(|ext| ext == "rs")
                {
                    files.push(path.to_path_buf());
                }
            }
            Err(err) => tracing::warn!("Error walking directory: {}", err),
        }
    }
    files.sort();
    Ok(files)
}

type FileResult = (PathBuf, Result<Analysis>);

fn analyze_all(files: &[PathBuf]) -> Vec<FileResult> {
    files
        .par_iter()
        .map(|path| {
            let analysis = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))
                .and_then(|source| {
                    callgrid_index::analyze_source(&source, &path.to_string_lossy())
                        .map_err(anyhow::Error::from)
                });
            (path.clone(), analysis)
        })
        .collect()
}

fn summarize(results: &[FileResult]) -> String {
    let mut out = String::new();
    let (mut declarations, mut edges, mut failed) = (0, 0, 0);
    for (path, result) in results {
        match result {
            Ok(a) => {
                declarations += a.declaration_count;
                edges += a.edge_count;
                out.push_str(&format!(
                    "{}: {} declarations, {} calls, {} impls\n",
                    path.display(),
                    a.declaration_count,
                    a.edge_count,
                    a.impl_count
                ));
            }
            Err(e) => {
                failed += 1;
                out.push_str(&format!("{}: error: {:#}\n", path.display(), e));
            }
        }
    }
    out.push_str(&format!(
        "{} files, {} declarations, {} calls, {} failed\n",
        results.len(),
        declarations,
        edges,
        failed
    ));
    out
}

#[derive(Debug, Serialize)]
struct PlacedNode {
    col: i32,
    row: i32,
    x: f32,
    y: f32,
}

#[derive(Debug, Serialize)]
struct LayoutOutput {
    file: String,
    nodes: BTreeMap<String, PlacedNode>,
    edges: Vec<(String, String)>,
}

fn layout_file(file: &Path) -> Result<LayoutOutput> {
    let source =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let analysis = callgrid_index::analyze_source(&source, &file.to_string_lossy())
        .with_context(|| format!("analyzing {}", file.display()))?;
    let model = GraphModel::from_analysis(&analysis);
    let layouter = GridLayouter::new();
    let layout = layouter.execute(&model);

    let edges = model.layout_edges();
    let misaligned = layout.misaligned(&edges).len();
    if misaligned > 0 {
        tracing::warn!("{} edges are not on a shared row or column", misaligned);
    }

    let nodes = layout
        .cells
        .iter()
        .map(|(name, &cell)| {
            let pixel = layouter.to_pixel(cell);
            (
                name.clone(),
                PlacedNode {
                    col: cell.col,
                    row: cell.row,
                    x: pixel.x,
                    y: pixel.y,
                },
            )
        })
        .collect();

    Ok(LayoutOutput {
        file: analysis.file,
        nodes,
        edges,
    })
}
