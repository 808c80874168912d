fn main() {
    if let Err(e) = mysql_helper::cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
