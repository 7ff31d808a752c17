use anyhow::Result;

fn main() -> Result<()> {
    codedoc_cli::main_entry()
}
