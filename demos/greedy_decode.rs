//! Greedy CTC decoding demo: builds a character vocabulary, decodes a
//! synthetic posterior tensor and prints the text.
//!
//! Usage:
//!   cargo run --example greedy_decode
//!   cargo run --example greedy_decode -- --text "hello world" --save vocab.txt
//!   cargo run --example greedy_decode -- --config decoding.json

use ctckit::{ctc_greedy_decode, CtcPrefixScorer, CtcTextEncoder, DecodingConfig, SpecialLabels};
use ndarray::Array3;

fn main() -> anyhow::Result<()> {
    // ── Parse simple CLI arguments ───────────────────────────────────────────
    let mut args = std::env::args().skip(1);

    let mut text   = "hello world".to_string();
    let mut save   = None;
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--text"   => { if let Some(v) = args.next() { text   = v; } }
            "--save"   => { if let Some(v) = args.next() { save   = Some(v); } }
            "--config" => { if let Some(v) = args.next() { config = Some(v); } }
            "--help"   => {
                println!("Usage: greedy_decode [--text TEXT] [--save FILE] [--config FILE]");
                return Ok(());
            }
            _ => {}
        }
    }

    // ── Vocabulary ───────────────────────────────────────────────────────────
    let special = SpecialLabels::new().bos_eos("<s>", "</s>").blank("<b>");
    let mut encoder = CtcTextEncoder::with_special_labels(0, special)?;
    encoder.update_from_iterable(text.chars());
    if let Some(path) = &save {
        encoder.save(path)?;
        println!("Saved vocabulary to {}", path);
    }

    let config = match &config {
        Some(path) => DecodingConfig::from_json_file(path)?,
        None => DecodingConfig::from_encoder(&encoder)?,
    };
    let vocab_size = encoder.len();
    let blank = config.resolve_blank(vocab_size)?;

    println!("Text       : {:?}", text);
    println!("Vocabulary : {} labels (blank = {})", vocab_size, blank);
    println!();

    // ── Synthetic posteriors: each char held for 2 frames, then a blank ─────
    let targets = encoder.encode_sequence(text.chars(), false)?;
    let frames: Vec<usize> = targets
        .iter()
        .flat_map(|&t| [t, t, blank])
        .collect();
    let mut probs = Array3::from_elem((1, frames.len(), vocab_size), 0.1 / vocab_size as f32);
    for (t, &label) in frames.iter().enumerate() {
        probs[[0, t, label]] = 0.9;
    }

    // ── Greedy decode ────────────────────────────────────────────────────────
    let decoded = ctc_greedy_decode(probs.view(), &[1.0], config.blank_index)?;
    let labels = encoder.decode_sequence(&decoded[0])?;
    let out: String = labels.iter().filter_map(|l| l.as_str()).collect();
    println!("Best path  : {} frames -> {} labels", frames.len(), decoded[0].len());
    println!("Decoded    : {:?}", out);

    // ── Prefix scores for the first output step ──────────────────────────────
    let eos = config.eos_index.unwrap_or(blank);
    let log_probs = probs.mapv(f32::ln);
    let scorer = CtcPrefixScorer::new(log_probs.view(), &[frames.len()], 1, 1, blank, eos)?;
    let (scores, _) = scorer.forward_step(&[Vec::<usize>::new()], None, None)?;
    let best = scores
        .row(0)
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i);
    if let Some(best) = best {
        println!("First token: {} ({:.3})", encoder.decode_label(best)?, scores[[0, best]]);
    }

    Ok(())
}
