fn main() {
    if let Err(err) = csv_dynamic::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
