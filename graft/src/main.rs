use clap::Parser as ClapParser;
use std::{
    fs,
    io::{self, Read},
    process,
};

use graft::host::LogLevel;
use graft::{BraceMode, ExecutionLimits, ExtractOptions, HostCreateInfo, Runtime, RuntimeCreateInfo};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Generated text to graft; `-` reads stdin
    #[arg(help = "File holding generated code, or - for stdin")]
    input: String,

    #[arg(long, default_value_t = 1, help = "Frames to run after installing")]
    frames: u32,

    #[arg(long, default_value_t = 0, help = "Fixed steps before each frame")]
    fixed_per_frame: u32,

    #[arg(long, help = "End method bodies at the first closing brace")]
    naive_braces: bool,

    #[arg(long, help = "Print the extracted declarations and stop")]
    extract_only: bool,

    #[arg(long, help = "Print the synthesized unit")]
    dump_unit: bool,

    #[arg(long, help = "Print the compiled bytecode")]
    dump_bytecode: bool,

    #[arg(long, help = "Sprite assigned to the host object")]
    sprite: Option<String>,

    #[arg(long, help = "Instruction budget per invocation")]
    fuel: Option<u64>,

    #[arg(long, value_name = "KEY", help = "Keys held for the whole run")]
    hold: Vec<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
    let cli = Cli::parse();

    let source = match read_input(&cli.input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error reading '{}': {}", cli.input, err);
            process::exit(1);
        }
    };

    let extract = ExtractOptions {
        braces: if cli.naive_braces {
            BraceMode::Naive
        } else {
            BraceMode::Balanced
        },
    };

    if cli.extract_only {
        let extraction = graft::extract_with(&source, &extract);
        dump_extraction(&extraction);
        return;
    }

    let mut limits = ExecutionLimits::default();
    if let Some(fuel) = cli.fuel {
        limits.fuel = fuel;
    }
    let mut runtime = Runtime::new(RuntimeCreateInfo {
        extract,
        host: HostCreateInfo {
            sprite: cli.sprite.clone(),
            ..HostCreateInfo::default()
        },
        limits,
        ..RuntimeCreateInfo::default()
    });

    let report = runtime.apply_source(&source);
    if cli.dump_unit {
        println!("== unit ==");
        print!("{}", report.unit);
    }
    for issue in &report.issues {
        eprintln!("warning: {issue}");
    }
    for diagnostic in &report.diagnostics {
        eprintln!("{diagnostic}");
    }
    if let Some(fault) = &report.init_fault {
        eprintln!("Error initializing fields: {fault}");
    }
    if !report.compiled() {
        process::exit(1);
    }
    if cli.dump_bytecode {
        if let Some(instance) = runtime.instance() {
            println!("== bytecode ==");
            print!("{}", instance.program());
        }
        return;
    }

    println!("bound: {}", report.bound.join(", "));
    for key in &cli.hold {
        runtime.world_mut().input.press(key);
    }

    for frame in 0..cli.frames {
        for _ in 0..cli.fixed_per_frame {
            if let Err(fault) = runtime.fixed_step() {
                eprintln!("Error in fixed step of frame {frame}: {fault}");
            }
        }
        if let Err(fault) = runtime.frame() {
            eprintln!("Error in frame {frame}: {fault}");
        }
        print_logs(&mut runtime, frame);
    }

    if let Some(host) = runtime.host() {
        if let Ok(object) = runtime.world().get(host) {
            let p = object.transform.position;
            println!("{} at ({}, {}, {})", object.name, p.x, p.y, p.z);
        }
    }
}

fn read_input(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        fs::read_to_string(path)
    }
}

fn dump_extraction(extraction: &graft::Extraction) {
    println!("-- imports --");
    for import in &extraction.imports {
        println!("{import}");
    }
    println!("-- variables --");
    for var in &extraction.variables {
        match &var.raw_initializer {
            Some(raw) => println!("{} {} = {}", var.declared_type, var.name, raw),
            None => println!("{} {}", var.declared_type, var.name),
        }
    }
    println!("-- methods --");
    for method in &extraction.methods {
        println!("{} {{{}}}", method.name, method.body);
    }
}

fn print_logs(runtime: &mut Runtime, frame: u32) {
    for entry in runtime.world_mut().take_logs() {
        let level = match entry.level {
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        };
        println!("[{frame}] {level}: {}", entry.message);
    }
}
