mod cli;

fn main() {
    cli::init_logging();
    std::process::exit(cli::run_from_env());
}
