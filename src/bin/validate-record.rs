use std::process;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;

use focus4::cli_utils::{
    emit_json, entity_or_exit, fail_with_usage, load_model_or_exit, read_record,
};
use focus4::{Scope, StoreNode, flatten_errors, make_form_node};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Options {
    #[arrrg(required, "Path to the YAML model")]
    model: String,
    #[arrrg(required, "Entity the records are instances of")]
    entity: String,
    #[arrrg(flag, "Print pass/fail and every error path for each file")]
    verbose: bool,
}

const USAGE: &str = r#"Usage: validate-record --model <PATH> --entity <NAME> [--verbose] <file>...

Validates JSON records against an entity of a YAML model.

Each file holds one JSON object. It is loaded into a store node, cloned into a
form in edit mode and checked with the validators of every field. The error
tree of every invalid record is printed as JSON.

Arguments:
  --model <PATH>     YAML model declaring domains and entities
  --entity <NAME>    Entity the records are instances of
  --verbose          Print pass/fail and every error path for each file

Exit status is 0 when every record is valid, 1 otherwise."#;

fn main() {
    let (options, free) = Options::from_command_line(USAGE);
    if free.is_empty() {
        fail_with_usage("no record given", USAGE);
    }

    let model = load_model_or_exit(&options.model);
    let entity = entity_or_exit(&model, &options.entity);

    let mut all_valid = true;
    for path in &free {
        let record = match read_record(path) {
            Ok(record) => record,
            Err(e) => {
                if options.verbose {
                    println!("{} fail", path);
                    println!("  {}", e);
                }
                all_valid = false;
                continue;
            }
        };

        let scope = Scope::new();
        let store = StoreNode::new(&entity);
        store.set(&record);
        let form = make_form_node(&scope, &store, |b| b.edit(true));
        let errors = form.errors();
        let flat = flatten_errors(&errors);

        if flat.is_empty() {
            if options.verbose {
                println!("{} pass", path);
            }
        } else {
            all_valid = false;
            if options.verbose {
                println!("{} fail", path);
                for (field, message) in &flat {
                    println!("  {}: {}", field, message);
                }
            }
            emit_json(&errors);
        }
    }

    if all_valid {
        process::exit(0);
    } else {
        process::exit(1);
    }
}
