fn main() {
    if let Err(err) = csv_rollup::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
