fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match run1c_core::runtime::parse_cli_args(&args) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("[run1c-core] {error}");
            std::process::exit(2);
        }
    };

    if let Err(error) = run1c_core::runtime::run_with_options(options) {
        eprintln!("[run1c-core] {error}");
        std::process::exit(1);
    }
}
