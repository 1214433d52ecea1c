mod bitmap;
mod expr;
mod init;
mod line;
mod parser;
mod passes;
mod report;
mod symbols;

use color_print::{cformat, cprintln};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input file (.asm)
    input: String,

    /// Output file; defaults to the input with a .hack extension
    #[clap(short, long)]
    output: Option<String>,

    /// Dump the symbol table after assembly
    #[clap(short, long)]
    symbols: bool,
}

fn main() {
    use clap::Parser;
    use std::io::Write;

    let args: Args = Args::parse();

    let output = match &args.output {
        Some(path) => path.clone(),
        None => match args.input.strip_suffix(".asm") {
            Some(stem) => format!("{stem}.hack"),
            None => {
                cprintln!("<red,bold>error</>: Input filename must end in .asm");
                std::process::exit(1);
            }
        },
    };

    let source = std::fs::read_to_string(&args.input)
        .expect(&cformat!("<r,s>Failed to open File</>: {}", &args.input));

    let asm = passes::assemble(&source, &bitmap::ImageBitmap);

    if !report::print_report(&asm) {
        std::process::exit(1);
    }
    if args.symbols {
        report::print_symbols(&asm);
    }

    let mut file = std::fs::File::create(&output)
        .expect(&cformat!("<r,s>Failed to create File</>: {}", &output));
    for word in asm.words() {
        writeln!(file, "{word:016b}")
            .expect(&cformat!("<r,s>Failed to write File</>: {}", &output));
    }
}
