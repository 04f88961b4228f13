fn main() {
    if let Err(err) = fileorg::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
