//! Default binary - shows help text.

fn main() {
    println!("Landisco {} - LAN Device Discovery Engine", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Available commands:");
    println!("  landisco   Run discovery from the CLI");
    println!();
    println!("For more information, run `landisco --help`");
}
