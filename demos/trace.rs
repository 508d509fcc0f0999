//! Render a guide, simulate tracing it and save the result as PNG
#![deny(warnings)]

use std::{env, fs::File, io::BufWriter, time::Duration};
use tracemask::*;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

type Error = Box<dyn std::error::Error>;

#[derive(Debug)]
struct Args {
    output_file: String,
    spec: GuideSpec,
    glyphs: Option<String>,
    coverage: Scalar,
}

impl Args {
    fn parse() -> Result<Args, Error> {
        let mut result = Args {
            output_file: String::new(),
            spec: GuideSpec::default(),
            glyphs: None,
            coverage: 1.0,
        };
        let mut positional = 0;
        let mut args = env::args();
        let cmd = args.next().unwrap_or_else(|| "trace".to_owned());
        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "-h" => {
                    positional = 0;
                    break;
                }
                "-t" => {
                    let text = args.next().ok_or("-t requires argument")?;
                    result.spec = result.spec.with_text(text);
                }
                "-c" => {
                    let config = args.next().ok_or("-c requires argument")?;
                    let text = std::fs::read_to_string(config)?;
                    result.spec = GuideSpec::from_json(&text)?;
                }
                "-g" => {
                    result.glyphs = Some(args.next().ok_or("-g requires argument")?);
                }
                "-p" => {
                    let part: Scalar = args.next().ok_or("-p requires argument")?.parse()?;
                    result.coverage = part.clamp(0.0, 1.0);
                }
                _ => {
                    positional += 1;
                    match positional {
                        1 => result.output_file = arg,
                        _ => return Err("unexpected positional argument".into()),
                    }
                }
            }
        }
        if positional < 1 {
            eprintln!("Render a guide, trace its outline and save the result");
            eprintln!("\nUSAGE:");
            eprintln!(
                "    {} [-t <text>] [-c <guide.json>] [-g <glyphs.json>] [-p <part>] <out.png>",
                cmd
            );
            eprintln!("\nARGS:");
            eprintln!("    -t <text>          text to trace");
            eprintln!("    -c <guide.json>    guide specification");
            eprintln!("    -g <glyphs.json>   glyph set used instead of the builtin one");
            eprintln!("    -p <part>          part of every outline to trace (default: 1.0)");
            eprintln!("    <out.png>          rendered guide with the simulated strokes");
            std::process::exit(1);
        }
        Ok(result)
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse()?;
    let font = match &args.glyphs {
        None => FontState::Ready(GlyphSet::builtin().clone()),
        Some(path) => FontState::from(GlyphSet::from_file(path)),
    };
    let mut engine = TraceEngine::new(args.spec, font);
    let attempt = engine.start();

    let outline = engine.guide().outline().to_vec();
    for polyline in &outline {
        let count = ((polyline.points.len() as Scalar) * args.coverage).ceil() as usize;
        for (index, point) in polyline.points.iter().take(count).enumerate() {
            let event = PointerEvent::new(1, *point);
            if index == 0 {
                engine.pointer_down(event);
            } else {
                engine.pointer_move(event);
            }
        }
        engine.pointer_up(PointerEvent::new(1, Point::default()));
    }
    tracing::info!(
        required = engine.guide().required_count(),
        covered = engine.coverage().count(),
        percent = engine.percent(),
        "traced"
    );

    let image = engine.frame().render();
    let file = BufWriter::new(File::create(&args.output_file)?);
    tracing::debug_span!("[save]").in_scope(|| write_png(&image, file))?;

    engine.advance(Duration::from_secs(1));
    if engine.is_active() {
        engine.force_finish(true);
    }
    match attempt.result() {
        Some(Ok(outcome)) => println!(
            "ratio: {:.3} completed: {}",
            outcome.ratio, outcome.completed
        ),
        Some(Err(error)) => println!("{}", error),
        None => println!("attempt is still pending"),
    }
    Ok(())
}
