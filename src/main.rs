use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use intcode::fuzz::{self, FuzzConfig};
use intcode::network::{Network, NetworkConfig};
use intcode::pipeline::Pipeline;
use intcode::{Computer, ComputerConfig, Program, ascii, disasm};
use log::info;

#[derive(Parser)]
#[command(name = "intcode", about = "Intcode virtual machine: run, inspect and wire up programs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program until it halts or waits for input.
    Run {
        /// Program file: comma-separated integers.
        path: PathBuf,

        /// Input values queued before the first run (e.g. 1,-2,3).
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        input: Vec<i64>,

        /// Overwrite a memory cell before running, as ADDR=VALUE. Repeatable.
        #[arg(long = "patch", value_parser = parse_patch)]
        patches: Vec<(usize, i64)>,

        /// Print the value at ADDR once the program stops. Repeatable.
        #[arg(long = "probe")]
        probes: Vec<usize>,

        /// Yield instead of failing when input runs out.
        #[arg(long)]
        blocking: bool,

        /// Print output as ASCII text.
        #[arg(long)]
        ascii: bool,

        /// Feed stdin lines as ASCII input whenever the program waits for input.
        #[arg(long)]
        interactive: bool,

        /// Max instructions between two outputs.
        #[arg(long)]
        step_limit: Option<usize>,
    },

    /// Print a disassembly of a program.
    Disasm {
        path: PathBuf,
    },

    /// Run a chain of amplifiers, one per phase setting.
    Chain {
        path: PathBuf,

        /// Phase settings, one per stage (e.g. 4,3,2,1,0).
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        phases: Vec<i64>,

        /// Feed the last stage back into the first until it halts.
        #[arg(long)]
        feedback: bool,

        /// Signal sent into the first stage.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        signal: i64,
    },

    /// Boot a packet network and report the first packet to an outside address.
    Net {
        path: PathBuf,

        /// Number of nodes.
        #[arg(long, default_value_t = 50)]
        size: usize,

        /// Address outside the network to watch.
        #[arg(long, default_value_t = 255)]
        watch: i64,

        /// Run the NAT monitor on the watched address and report the first
        /// Y value it resends twice in a row.
        #[arg(long)]
        nat: bool,
    },

    /// Soak-test the interpreter on random programs.
    Fuzz {
        /// Random seed for reproducibility.
        #[arg(long)]
        seed: u64,

        /// Number of programs to generate.
        #[arg(long, default_value_t = 1 << 12)]
        programs: usize,

        /// Words per program.
        #[arg(long, default_value_t = 64)]
        length: usize,

        /// Max instructions per program.
        #[arg(long, default_value_t = 1 << 12)]
        step_limit: usize,
    },
}

/// Parse an "ADDR=VALUE" patch.
fn parse_patch(s: &str) -> Result<(usize, i64), String> {
    let (addr, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid patch '{s}', expected ADDR=VALUE (e.g. 1=12)"))?;
    let addr = addr.trim().parse::<usize>().map_err(|e| format!("Invalid patch address: {e}"))?;
    let value = value.trim().parse::<i64>().map_err(|e| format!("Invalid patch value: {e}"))?;
    Ok((addr, value))
}

fn load(path: &Path) -> Result<Program, Box<dyn Error>> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let program = text.parse::<Program>().map_err(|e| format!("{}: {e}", path.display()))?;
    info!("loaded {} words from {}", program.len(), path.display());
    Ok(program)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            path,
            input,
            patches,
            probes,
            blocking,
            ascii,
            interactive,
            step_limit,
        } => {
            let config = ComputerConfig {
                blocking_input: blocking || interactive,
                step_limit,
                ..ComputerConfig::default()
            };
            run_program(&path, config, input, &patches, &probes, ascii, interactive)
        }
        Command::Disasm { path } => {
            load(&path).map(|program| print!("{}", disasm::disassemble(&program)))
        }
        Command::Chain {
            path,
            phases,
            feedback,
            signal,
        } => run_chain(&path, &phases, feedback, signal),
        Command::Net {
            path,
            size,
            watch,
            nat,
        } => run_network(&path, size, watch, nat),
        Command::Fuzz {
            seed,
            programs,
            length,
            step_limit,
        } => {
            let config = FuzzConfig {
                programs,
                program_len: length,
                step_limit,
                ..FuzzConfig::default()
            };
            run_fuzz(&config, seed);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_outputs(outputs: &[i64], as_ascii: bool) {
    if as_ascii {
        print!("{}", ascii::render(outputs));
    } else {
        for value in outputs {
            println!("{value}");
        }
    }
    let _ = io::stdout().flush();
}

fn run_program(
    path: &Path,
    config: ComputerConfig,
    input: Vec<i64>,
    patches: &[(usize, i64)],
    probes: &[usize],
    as_ascii: bool,
    interactive: bool,
) -> Result<(), Box<dyn Error>> {
    let mut computer = Computer::with_config(load(path)?, config);
    for &(addr, value) in patches {
        computer.poke(addr, value)?;
    }

    let mut pending = input;
    let mut lines = io::stdin().lock().lines();
    loop {
        let outputs = computer.drain(pending.drain(..))?;
        print_outputs(&outputs, as_ascii || interactive);
        if computer.is_halted() || !interactive {
            break;
        }
        match lines.next() {
            Some(line) => pending = ascii::encode_line(&line?),
            None => break,
        }
    }

    if computer.needs_input() {
        info!("program is waiting for input at ip {}", computer.instruction_pointer());
    }
    info!("executed {} instructions", computer.steps());
    for &addr in probes {
        println!("[{addr}] = {}", computer.peek(addr)?);
    }
    Ok(())
}

fn run_chain(
    path: &Path,
    phases: &[i64],
    feedback: bool,
    signal: i64,
) -> Result<(), Box<dyn Error>> {
    let program = load(path)?;
    let mut pipeline = Pipeline::new(&program, phases);
    let result = if feedback {
        pipeline.run_feedback(signal)?
    } else {
        pipeline.run_once(signal)?
    };
    println!("{result}");
    Ok(())
}

fn run_network(path: &Path, size: usize, watch: i64, nat: bool) -> Result<(), Box<dyn Error>> {
    let program = load(path)?;
    let config = NetworkConfig {
        size,
        nat_address: watch,
        ..NetworkConfig::default()
    };
    let mut network = Network::new(&program, config);
    if nat {
        let y = network.run_with_nat()?;
        println!("{y}");
    } else {
        let packet = network.run_until_packet_to(watch)?;
        println!("{},{}", packet.x, packet.y);
    }
    info!("network ran for {} ticks", network.ticks());
    Ok(())
}

fn run_fuzz(config: &FuzzConfig, seed: u64) {
    let start = std::time::Instant::now();
    let report = fuzz::soak(config, seed);
    let elapsed = start.elapsed();

    println!("programs,{}", report.programs);
    println!("halted,{}", report.halted);
    println!("starved,{}", report.starved);
    println!("outputs,{}", report.outputs);
    for (kind, count) in &report.faults {
        println!("{kind},{count}");
    }
    info!(
        "soaked {} programs in {elapsed:.2?} ({:.0} programs/sec)",
        report.programs,
        report.programs as f64 / elapsed.as_secs_f64()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patch() {
        assert_eq!(parse_patch("1=12"), Ok((1, 12)));
        assert_eq!(parse_patch(" 2 = -7 "), Ok((2, -7)));
        assert!(parse_patch("12").is_err());
        assert!(parse_patch("-1=3").is_err());
        assert!(parse_patch("1=x").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "intcode", "run", "prog.txt", "--input", "1,-2", "--patch", "1=12", "--patch", "2=2",
            "--probe", "0",
        ])
        .unwrap();
        match cli.command {
            Command::Run { input, patches, probes, .. } => {
                assert_eq!(input, vec![1, -2]);
                assert_eq!(patches, vec![(1, 12), (2, 2)]);
                assert_eq!(probes, vec![0]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_chain_requires_phases() {
        assert!(Cli::try_parse_from(["intcode", "chain", "prog.txt"]).is_err());
        let args = ["intcode", "chain", "prog.txt", "--phases", "9,8,7", "--feedback"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Chain { phases, feedback, .. } => {
                assert_eq!(phases, vec![9, 8, 7]);
                assert!(feedback);
            }
            _ => panic!("expected chain"),
        }
    }
}
