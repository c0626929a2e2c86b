// Demo session - Offline end-to-end run of the companion pipeline
// Synthesizes a hummed melody, segments it against the grid, lets a toy
// model answer at the loop boundary, and exports the result as MIDI

use chrono::Utc;
use loopmate::{
    AnalysisFrame, AutocorrelationSampler, CompanionEngine, EngineConfig, GenerationError,
    GenerativeModel, ModelNote, PitchRange, PitchSampler, create_frame_channel,
    create_notification_channel,
};
use ringbuf::traits::{Consumer, Producer};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SAMPLE_RATE: u32 = 48_000;
const BLOCK_SIZE: usize = 512;
const FRAME_RINGBUFFER_CAPACITY: usize = 256;
const NOTIFICATION_RINGBUFFER_CAPACITY: usize = 64;

/// Toy companion: answers the phrase transposed up a perfect fifth
struct FifthsModel;

impl GenerativeModel for FifthsModel {
    fn pitch_range(&self) -> PitchRange {
        PitchRange::new(36, 96)
    }

    fn generate(&self, phrase: &[ModelNote]) -> Result<Vec<ModelNote>, GenerationError> {
        // Pretend the model thinks for a moment
        thread::sleep(Duration::from_millis(50));
        Ok(phrase
            .iter()
            .map(|note| ModelNote {
                pitch: (note.pitch + 7).min(127),
                ..*note
            })
            .collect())
    }
}

/// The hummed melody: (frequency Hz or rest, duration seconds)
const MELODY: [(Option<f32>, f64); 7] = [
    (Some(440.00), 0.45), // A4
    (None, 0.20),
    (Some(523.25), 0.45), // C5
    (None, 0.20),
    (Some(659.25), 0.45), // E5
    (None, 0.20),
    (Some(440.00), 0.45), // A4 again
];

fn main() {
    println!("=== Loopmate demo session ===\n");

    let config = EngineConfig {
        bars: 1,
        ..EngineConfig::default()
    };
    println!(
        "Grid: {} bars at {} BPM, division {} ({} cells per cycle)",
        config.bars,
        config.bpm,
        config.grid_division,
        config.grid_clock().total_cells()
    );

    let (mut frame_tx, mut frame_rx) = create_frame_channel(FRAME_RINGBUFFER_CAPACITY);
    let (notification_tx, mut notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);

    let mut engine = match CompanionEngine::new(config, Arc::new(FifthsModel), notification_tx) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return;
        }
    };
    engine.start();

    let mut sampler = match AutocorrelationSampler::new(SAMPLE_RATE) {
        Ok(sampler) => sampler,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return;
        }
    };

    // Drive two full loop cycles so the boundary fires and the model has
    // time to answer inside the second cycle
    let cycle = engine.grid().cycle_duration();
    let total_blocks = (2.2 * cycle * SAMPLE_RATE as f64 / BLOCK_SIZE as f64) as usize;
    let block_duration = BLOCK_SIZE as f64 / SAMPLE_RATE as f64;

    println!("Running {} blocks (~{:.1}s of audio)...\n", total_blocks, total_blocks as f64 * block_duration);

    let mut sample_index = 0usize;
    for block_index in 0..total_blocks {
        let time = block_index as f64 * block_duration;
        let block = synthesize_block(time, &mut sample_index);

        let frame = match sampler.analyze(&block, time) {
            Ok(frame) => frame,
            Err(e) => {
                eprintln!("ERROR: pitch sampler failed: {}", e);
                return;
            }
        };
        if frame_tx.try_push(frame).is_err() {
            eprintln!("WARNING: frame queue full, dropping a frame");
        }

        let outcomes = match engine.drain_frames(&mut frame_rx) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return;
            }
        };
        for outcome in outcomes {
            if let Some(note) = outcome.committed {
                println!(
                    "  committed {} at cells {}..{}",
                    note.note_name(),
                    note.start_position,
                    note.end_position
                );
            }
            if outcome.boundary {
                println!("  -- loop boundary at {:.2}s --", time);
            }
        }

        // The model worker needs real time to respond in this offline run
        if block_index % 64 == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }

    let _ = engine.finalize(total_blocks as f64 * block_duration);

    while let Some(notification) = notification_rx.try_pop() {
        println!("[{:?}/{:?}] {}", notification.level, notification.category, notification.message);
    }

    println!("\nCommitted notes: {}", engine.committed_notes().len());
    for note in engine.committed_notes() {
        println!(
            "  {} cells {:>2}..{:>2} ({:.2}s-{:.2}s)",
            note.note_name(),
            note.start_position,
            note.end_position,
            note.start_time,
            note.end_time
        );
    }
    println!("Companion notes: {}", engine.generated_notes().len());
    for note in engine.generated_notes() {
        println!("  {} cells {:>2}..{:>2}", note.note_name(), note.start_position, note.end_position);
    }

    let filename = format!("loopmate-session-{}.mid", Utc::now().format("%Y%m%d-%H%M%S"));
    match engine.export_midi(std::path::Path::new(&filename)) {
        Ok(()) => println!("\nExported {}", filename),
        Err(e) => eprintln!("ERROR: MIDI export failed: {}", e),
    }
}

/// Render one block of the looped melody as a sine wave
fn synthesize_block(start_time: f64, sample_index: &mut usize) -> Vec<f32> {
    let melody_length: f64 = MELODY.iter().map(|(_, d)| d).sum();
    let mut block = Vec::with_capacity(BLOCK_SIZE);

    for i in 0..BLOCK_SIZE {
        let t = start_time + i as f64 / SAMPLE_RATE as f64;
        let t_in_melody = t % melody_length;

        let mut cursor = 0.0;
        let mut sample = 0.0f32;
        for (freq, duration) in MELODY {
            if t_in_melody < cursor + duration {
                if let Some(freq) = freq {
                    let phase = *sample_index as f32 / SAMPLE_RATE as f32;
                    sample = (2.0 * std::f32::consts::PI * freq * phase).sin() * 0.4;
                }
                break;
            }
            cursor += duration;
        }

        block.push(sample);
        *sample_index += 1;
    }

    block
}
