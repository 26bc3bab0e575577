//! Terminal styling utilities

use colored::Colorize;

pub fn style_cyan(s: &str) -> String {
    s.cyan().to_string()
}

pub fn style_green(s: &str) -> String {
    s.green().to_string()
}

pub fn style_red(s: &str) -> String {
    s.red().to_string()
}

pub fn style_yellow(s: &str) -> String {
    s.yellow().to_string()
}

pub fn style_dim(s: &str) -> String {
    s.dimmed().to_string()
}

pub fn style_bold(s: &str) -> String {
    s.bold().to_string()
}

pub fn print_success(msg: &str) {
    println!("{} {}", style_green("✓"), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", style_red("✗"), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", style_yellow("⚠"), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", style_cyan("ℹ"), msg);
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", style_bold(title));
    println!("{}", "─".repeat(title.chars().count()));
}

/// Fame value colored by sign
pub fn style_fame(value: i32) -> String {
    if value < 0 {
        style_red(&value.to_string())
    } else if value > 0 {
        style_green(&format!("+{}", value))
    } else {
        style_dim(&value.to_string())
    }
}
