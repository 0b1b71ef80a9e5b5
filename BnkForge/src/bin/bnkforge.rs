fn main() -> anyhow::Result<()> {
    bnkforge::cli::run_cli()
}
