fn main() {
    if let Err(err) = cricket_pred::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
