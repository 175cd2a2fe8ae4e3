use clap::{Args as ClapArgs, Parser, Subcommand};
use lrv_core::{
    DirStore, DocumentStore, FieldPath, FieldRules, PathMatcher, ReviewSession, RowId, Segment,
    WidgetNode,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::SubscriberBuilder;

#[derive(Parser, Debug)]
#[command(
    name = "lrv-cli",
    about = "Inspect and correct extracted lease documents field by field",
    version
)]
struct Cli {
    /// Log engine activity to stderr
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List document ids in a store directory
    List(StoreArgs),
    /// Print the editor tree of a document
    Show(DocArgs),
    /// Apply field edits, flags and row changes, then save
    Edit(EditArgs),
    /// Print the rule form of a path, e.g. parties[3].name -> parties[*].name
    Normalize { path: String },
    /// Print the stock rules as JSON (a starting point for rules.json)
    Rules,
}

#[derive(ClapArgs, Debug)]
struct StoreArgs {
    /// Store directory holding <id>.json files
    store: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct DocArgs {
    /// Store directory holding <id>.json files
    store: PathBuf,
    /// Document id (file stem)
    id: String,
    /// Rules file; defaults to <store>/rules.json, then the stock lease rules
    #[arg(long)]
    rules: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct EditArgs {
    #[command(flatten)]
    doc: DocArgs,
    /// Set a field from text, e.g. --set parties[0].name=Acme
    #[arg(long = "set", value_name = "PATH=TEXT")]
    sets: Vec<String>,
    /// Flag a field for review
    #[arg(long = "flag", value_name = "PATH")]
    flags: Vec<String>,
    /// Clear a review flag
    #[arg(long = "unflag", value_name = "PATH")]
    unflags: Vec<String>,
    /// Append a blank row to a list
    #[arg(long = "add", value_name = "LIST")]
    adds: Vec<String>,
    /// Remove a row as numbered when loaded, e.g. --remove tracts[1];
    /// --add and --set use the numbering after removals
    #[arg(long = "remove", value_name = "LIST[i]")]
    removes: Vec<String>,
    /// Print the corrected JSON and flags instead of saving
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Skip the zip backup of the previous correction
    #[arg(long, default_value_t = false)]
    no_backup: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    let _ = SubscriberBuilder::default()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();

    match cli.cmd {
        Cmd::List(a) => cmd_list(a),
        Cmd::Show(a) => cmd_show(a),
        Cmd::Edit(a) => cmd_edit(a),
        Cmd::Normalize { path } => cmd_normalize(&path),
        Cmd::Rules => cmd_rules(),
    }
}

fn fail(code: i32, msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", msg);
    std::process::exit(code);
}

fn parse_path(s: &str) -> FieldPath {
    FieldPath::parse(s).unwrap_or_else(|e| fail(3, e))
}

fn load_matcher(store: &Path, rules: Option<&Path>) -> Arc<PathMatcher> {
    let rules = match rules {
        Some(p) => FieldRules::load(p),
        None => FieldRules::discover(store),
    }
    .unwrap_or_else(|e| fail(2, e));
    Arc::new(PathMatcher::new(&rules).unwrap_or_else(|e| fail(2, e)))
}

fn open_session(args: &DocArgs, store: &DirStore) -> ReviewSession {
    let matcher = load_matcher(&args.store, args.rules.as_deref());
    ReviewSession::open(store, matcher, &args.id).unwrap_or_else(|e| fail(2, e))
}

fn cmd_list(args: StoreArgs) {
    let store = DirStore::new(args.store);
    match store.list_documents() {
        Ok(ids) => {
            for id in ids {
                println!("{}", id);
            }
        }
        Err(e) => fail(2, e),
    }
}

fn cmd_show(args: DocArgs) {
    let store = DirStore::new(&args.store);
    let session = open_session(&args, &store);
    if let Some(pdf) = session.pdf() {
        println!("# pdf: {}", pdf.display());
    }
    match session.tree() {
        Some(root) => print_node(&session, root, 0),
        None => println!("(document root is excluded by rules)"),
    }
}

fn print_node(session: &ReviewSession, node: &WidgetNode, depth: usize) {
    let pad = "  ".repeat(depth);
    match node {
        WidgetNode::Group { fields } => {
            for f in fields {
                if let WidgetNode::Leaf { .. } = f.node {
                    print!("{}{}: ", pad, f.label);
                    print_node(session, &f.node, 0);
                } else {
                    println!("{}{}:", pad, f.label);
                    print_node(session, &f.node, depth + 1);
                }
            }
        }
        WidgetNode::List { path, rows } => {
            for (i, row) in rows.iter().enumerate() {
                println!(
                    "{}- [{}] {}",
                    pad,
                    i,
                    row.caption.as_deref().unwrap_or("")
                );
                if let Some(n) = &row.node {
                    print_node(session, n, depth + 1);
                }
            }
            println!("{}+ add to {}", pad, path);
        }
        WidgetNode::Leaf { path } => {
            let index = session.index();
            let Some(editor) = index.editor(path) else {
                println!("<unbound {}>", path);
                return;
            };
            let flagged = index.flags.get(path).is_some_and(|f| f.checked);
            println!(
                "{}{:?} ({}){}",
                pad,
                editor.text(),
                editor.widget.kind,
                if flagged { " [flagged]" } else { "" }
            );
        }
    }
}

/// Maps `list[i]` to the list path and the id of the row currently at `i`.
fn resolve_row(session: &ReviewSession, arg: &str) -> (FieldPath, RowId) {
    let path = parse_path(arg);
    let Some((Segment::Index(i), parent)) = path.segments().split_last() else {
        fail(3, format!("--remove expects LIST[i], got '{}'", arg));
    };
    let list_path = FieldPath::root().join(parent);
    let id = session
        .index()
        .list(&list_path)
        .and_then(|l| l.rows.get(*i))
        .map(|r| r.id)
        .unwrap_or_else(|| fail(4, format!("no row {} in list '{}'", i, list_path)));
    (list_path, id)
}

/// Orders removals so nested lists go before the lists containing them.
/// Removing an outer row rebuilds everything below it with fresh row ids.
fn deepest_first(mut removals: Vec<(FieldPath, RowId)>) -> Vec<(FieldPath, RowId)> {
    removals.sort_by_key(|(list, _)| std::cmp::Reverse(list.len()));
    removals
}

fn cmd_edit(args: EditArgs) {
    let store = DirStore::new(&args.doc.store).with_backup(!args.no_backup);
    let mut session = open_session(&args.doc, &store);

    // resolve every removal against the loaded numbering before anything moves
    let removals = deepest_first(
        args.removes
            .iter()
            .map(|s| resolve_row(&session, s))
            .collect(),
    );
    for (list, id) in removals {
        session.remove_item(&list, id).unwrap_or_else(|e| fail(4, e));
    }
    for list in &args.adds {
        session
            .add_item(&parse_path(list))
            .unwrap_or_else(|e| fail(4, e));
    }
    for assignment in &args.sets {
        let Some((path, text)) = assignment.split_once('=') else {
            fail(3, format!("--set expects PATH=TEXT, got '{}'", assignment));
        };
        let path = parse_path(path);
        match session.editor_mut(&path) {
            Some(editor) => editor.set_text(text).unwrap_or_else(|e| fail(3, e)),
            None => fail(4, format!("no editable field at '{}'", path)),
        }
    }
    for (paths, on) in [(&args.flags, true), (&args.unflags, false)] {
        for p in paths {
            let path = parse_path(p);
            match session.flag_mut(&path) {
                Some(flag) => flag.checked = on,
                None => fail(4, format!("no flaggable field at '{}'", path)),
            }
        }
    }

    if args.dry_run {
        let value = session.collect_tree().unwrap_or_else(|e| fail(5, e));
        let out = serde_json::json!({ "value": value, "flags": session.collect_flags() });
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{}", s),
            Err(e) => fail(5, e),
        }
        return;
    }
    match session.save(&store) {
        Ok(_) => println!("saved {}", session.doc_id()),
        Err(e) => fail(5, e),
    }
}

fn cmd_normalize(path: &str) {
    println!("{}", parse_path(path).normalize());
}

fn cmd_rules() {
    match serde_json::to_string_pretty(&FieldRules::lease_defaults()) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(5, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lrv_core::FlagMap;
    use serde_json::json;

    #[test]
    fn nested_removal_survives_outer_removal_on_the_same_command() {
        let matcher = Arc::new(PathMatcher::new(&FieldRules::default()).unwrap());
        let doc = json!({"tracts": [
            {"county": "Reeves", "depths": [{"from": 0}]},
            {"county": "Ward", "depths": [{"from": 0}, {"from": 5000}]}
        ]});
        let mut session = ReviewSession::from_value(matcher, "d", doc, &FlagMap::new()).unwrap();

        // given outer first, as a user would type them
        let removals = deepest_first(vec![
            resolve_row(&session, "tracts[0]"),
            resolve_row(&session, "tracts[1].depths[0]"),
        ]);
        assert_eq!(removals[0].0.to_string(), "tracts[1].depths");
        for (list, id) in removals {
            session.remove_item(&list, id).unwrap();
        }
        assert_eq!(
            session.collect_tree().unwrap(),
            json!({"tracts": [{"county": "Ward", "depths": [{"from": 5000}]}]})
        );
    }
}
