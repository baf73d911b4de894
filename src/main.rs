fn main() {
    if let Err(e) = compliance_analyzer_lib::run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
