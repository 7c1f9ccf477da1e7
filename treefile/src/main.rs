#![cfg_attr(test, allow(clippy::unwrap_used))]
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use treefile::btree::{BTree, BTreeError, Cell, Cursor, CursorMode, Key, NodeKind, SeekMode};
use treefile::config::EngineConfig;
use treefile::storage::{FilePager, PageNumber};

/// Inspect and edit a treefile database.
///
/// The database file is taken from `TREEFILE_DATABASE_PATH`.
#[derive(Parser, Debug)]
#[command(name = "treefile", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty table tree and print its root page.
    CreateTable,
    /// Create an empty index tree and print its root page.
    CreateIndex,
    /// Insert a row into a table tree.
    Insert {
        root: PageNumber,
        key: Key,
        text: String,
    },
    /// Insert an entry into an index tree.
    IndexInsert {
        root: PageNumber,
        key: Key,
        primary_key: Key,
    },
    /// Print the entry stored under a key.
    Get { root: PageNumber, key: Key },
    /// Print every entry in ascending key order.
    Scan { root: PageNumber },
    /// Print every entry in descending key order.
    ReverseScan { root: PageNumber },
    /// Print the entry a seek lands on.
    Seek {
        root: PageNumber,
        mode: SeekArg,
        key: Key,
    },
    /// Check the structure of a tree.
    Verify { root: PageNumber },
    /// Print every node of a tree.
    Dump { root: PageNumber },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SeekArg {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
}

impl From<SeekArg> for SeekMode {
    fn from(arg: SeekArg) -> Self {
        match arg {
            SeekArg::Eq => Self::Eq,
            SeekArg::Ge => Self::Ge,
            SeekArg::Gt => Self::Gt,
            SeekArg::Le => Self::Le,
            SeekArg::Lt => Self::Lt,
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treefile=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    let mut tree = match BTree::open(&config.database_path, &config) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::error!(
                "Failed to open {}: {e}",
                config.database_path.display()
            );
            process::exit(1);
        }
    };

    if let Err(e) = run(&mut tree, cli.command) {
        tracing::error!("{e}");
        process::exit(1);
    }
    if let Err(e) = tree.close() {
        tracing::error!("Failed to close database: {e}");
        process::exit(1);
    }
}

fn run(tree: &mut BTree<FilePager>, command: Command) -> Result<(), BTreeError> {
    match command {
        Command::CreateTable => println!("{}", tree.create_tree(NodeKind::TableLeaf)?),
        Command::CreateIndex => println!("{}", tree.create_tree(NodeKind::IndexLeaf)?),
        Command::Insert { root, key, text } => tree.insert_in_table(root, key, text.as_bytes())?,
        Command::IndexInsert {
            root,
            key,
            primary_key,
        } => tree.insert_in_index(root, key, primary_key)?,
        Command::Get { root, key } => println!("{}", format_cell(&tree.find_cell(root, key)?)),
        Command::Scan { root } => scan(tree, root, false)?,
        Command::ReverseScan { root } => scan(tree, root, true)?,
        Command::Seek { root, mode, key } => {
            let mut cursor = Cursor::new(tree, root, CursorMode::Read)?;
            let landed = cursor
                .seek(tree, key, mode.into())
                .and_then(|()| cursor.current());
            cursor.destroy(tree);
            println!("{}", format_cell(&landed?));
        }
        Command::Verify { root } => {
            let stats = tree.verify(root)?;
            println!(
                "ok: depth {}, {} internal nodes, {} leaves, {} entries",
                stats.depth, stats.internal_nodes, stats.leaf_nodes, stats.entries
            );
        }
        Command::Dump { root } => dump(tree, root, 0)?,
    }
    Ok(())
}

fn scan(tree: &mut BTree<FilePager>, root: PageNumber, reverse: bool) -> Result<(), BTreeError> {
    let mut cursor = Cursor::new(tree, root, CursorMode::Read)?;
    let result = scan_with(tree, &mut cursor, reverse);
    cursor.destroy(tree);
    result
}

fn scan_with(
    tree: &mut BTree<FilePager>,
    cursor: &mut Cursor,
    reverse: bool,
) -> Result<(), BTreeError> {
    let positioned = if reverse {
        cursor.seek(tree, Key::MAX, SeekMode::Le)
    } else {
        cursor.rewind(tree)
    };
    match positioned {
        Ok(()) => {}
        Err(BTreeError::NotFound) => return Ok(()),
        Err(e) => return Err(e),
    }

    loop {
        println!("{}", format_cell(&cursor.current()?));
        let step = if reverse {
            cursor.prev(tree)
        } else {
            cursor.next(tree)
        };
        match step {
            Ok(()) => {}
            Err(BTreeError::EndOfTraversal) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

fn dump(tree: &mut BTree<FilePager>, page: PageNumber, depth: usize) -> Result<(), BTreeError> {
    let node = tree.load_node(page)?;
    let cells = node.cells()?;
    let keys: Vec<Key> = cells.iter().map(Cell::key).collect();
    println!(
        "{:indent$}page {page} {} cells={} free={} keys={keys:?}",
        "",
        node.kind(),
        node.cell_count(),
        node.free_space(),
        indent = depth * 2
    );
    let right_child = node.right_child();
    tree.release_node(node);

    for child in cells.iter().filter_map(Cell::child).chain(right_child) {
        dump(tree, child, depth + 1)?;
    }
    Ok(())
}

fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::TableLeaf { key, payload } => {
            format!("{key}\t{}", String::from_utf8_lossy(payload))
        }
        Cell::IndexLeaf { key, primary_key } => format!("{key}\t{primary_key}"),
        Cell::TableInternal { key, child } => format!("{key}\t-> {child}"),
        Cell::IndexInternal {
            key,
            child,
            primary_key,
        } => format!("{key}\t{primary_key}\t-> {child}"),
    }
}
