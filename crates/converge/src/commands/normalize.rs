use colored::Colorize;
use converge_core::{ConstraintPair, Flag, normalize};

pub fn handle(
    flag_field: String,
    list_field: String,
    all: Option<bool>,
    items: Option<Vec<String>>,
) -> anyhow::Result<()> {
    let mut pair = ConstraintPair::new(flag_field, list_field).with_flag(Flag::from(all));
    if let Some(items) = items {
        pair = pair.with_items(items.into_iter().filter(|i| !i.is_empty()).collect());
    }

    match normalize(pair) {
        Ok(pair) => {
            let flag = pair.all_items.value().unwrap_or_default();
            let items = pair.specific_items.unwrap_or_default();
            println!("{}: {}", pair.flag_field.cyan(), flag);
            if items.is_empty() {
                println!("{}: []", pair.list_field.cyan());
            } else {
                println!("{}: [{}]", pair.list_field.cyan(), items.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
