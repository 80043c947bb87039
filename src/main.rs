fn main() {
    if let Err(err) = csv_upsert::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
