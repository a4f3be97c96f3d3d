use madlibs_tui::{
    chip::{Category, Chip},
    compile::{KeywordCatalog, compile},
    editor::{Segment, SegmentList, StoryEditor},
    render::render_surface,
    surface::Surface,
    sync::Synchronizer,
    theme::Theme,
};
use std::time::{Duration, Instant};

/// Performance benchmark suite for the story editor
///
/// Run with: cargo test --release --bench performance -- --nocapture
///
/// This measures:
/// - Surface projection and layout
/// - The reconcile pass behind every keystroke
/// - Compiling a story into tokens
const SMALL_STORY_SENTENCES: usize = 10;
const MEDIUM_STORY_SENTENCES: usize = 100;
const LARGE_STORY_SENTENCES: usize = 1000;

const ITERATIONS: usize = 100;

const SAMPLE_WORDS: [&str; 16] = [
    "Once", "upon", "a", "Time", "the", "brave", "Person", "walked", "into", "every", "quiet",
    "Place", "and", "found", "nothing", "there",
];

/// A story with a chip after every few words and a paragraph break now and then.
fn create_test_story(sentences: usize, words_per_sentence: usize) -> SegmentList {
    let mut segments = Vec::new();
    for i in 0..sentences {
        let mut text = String::new();
        for j in 0..words_per_sentence {
            text.push_str(SAMPLE_WORDS[(i + j) % SAMPLE_WORDS.len()]);
            text.push(' ');
        }
        segments.push(Segment::Text(text));
        let category = Category::ALL[i % Category::ALL.len()];
        segments.push(Segment::Placeholder(Chip::catalog(category, None)));
        segments.push(Segment::Text(if i % 5 == 4 { ".\n".into() } else { ". ".into() }));
    }
    SegmentList::from_segments(segments)
}

struct BenchmarkResult {
    name: String,
    iterations: usize,
    total_duration: Duration,
    avg_duration: Duration,
    min_duration: Duration,
    max_duration: Duration,
}

impl BenchmarkResult {
    fn print(&self) {
        println!("\n{}", "=".repeat(70));
        println!("Benchmark: {}", self.name);
        println!("{}", "=".repeat(70));
        println!("Iterations:     {}", self.iterations);
        println!("Total time:     {:?}", self.total_duration);
        println!("Average:        {:?}", self.avg_duration);
        println!("Min:            {:?}", self.min_duration);
        println!("Max:            {:?}", self.max_duration);
        println!(
            "Ops/sec:        {:.2}",
            1.0 / self.avg_duration.as_secs_f64().max(f64::EPSILON)
        );

        if self.avg_duration.as_millis() > 100 {
            println!("\n⚠️  WARNING: Average duration > 100ms (user-perceptible lag)");
        } else if self.avg_duration.as_millis() > 16 {
            println!("\n⚠️  WARNING: Average duration > 16ms (may drop frames)");
        }
    }
}

fn benchmark<F>(name: &str, iterations: usize, mut f: F) -> BenchmarkResult
where
    F: FnMut(),
{
    let mut durations = Vec::with_capacity(iterations);

    // Warmup
    for _ in 0..10 {
        f();
    }

    for _ in 0..iterations {
        let start = Instant::now();
        f();
        durations.push(start.elapsed());
    }

    let total_duration: Duration = durations.iter().sum();
    let avg_duration = total_duration / iterations as u32;
    let min_duration = durations.iter().min().copied().unwrap_or_default();
    let max_duration = durations.iter().max().copied().unwrap_or_default();

    BenchmarkResult {
        name: name.to_string(),
        iterations,
        total_duration,
        avg_duration,
        min_duration,
        max_duration,
    }
}

fn story_sizes() -> Vec<(&'static str, SegmentList)> {
    vec![
        ("Small (10 sentences)", create_test_story(SMALL_STORY_SENTENCES, 12)),
        ("Medium (100 sentences)", create_test_story(MEDIUM_STORY_SENTENCES, 12)),
        ("Large (1000 sentences)", create_test_story(LARGE_STORY_SENTENCES, 12)),
    ]
}

#[test]
fn bench_projection_and_layout() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║           SURFACE LAYOUT BENCHMARKS                            ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let theme = Theme::default();
    for (name, story) in story_sizes() {
        let iterations = if name.contains("Large") { 10 } else { ITERATIONS };
        let result = benchmark(&format!("project + render - {name}"), iterations, || {
            let surface = Surface::project(&story);
            let _ = render_surface(&surface, None, 80, &theme);
        });
        result.print();
    }
}

#[test]
fn bench_typing_reconcile() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              TYPING RECONCILE BENCHMARKS                       ║");
    println!("╚════════════════════════════════════════════════════════════════╝");
    println!("\nThis simulates the full cost of typing a character:");
    println!("  1. Insert character into the surface");
    println!("  2. Read the story back and re-project");
    println!("  3. Restore the caret");

    for (name, story) in story_sizes() {
        let iterations = if name.contains("Large") { 10 } else { ITERATIONS };
        let result = benchmark(&format!("Typing cycle - {name}"), iterations, || {
            let mut editor = StoryEditor::with_segments(story.clone());
            let mut sync = Synchronizer::attach(&editor, Duration::ZERO);
            for _ in 0..10 {
                sync.handle_input(&mut editor, "x");
                sync.flush();
            }
        });
        result.print();

        let per_char = result.avg_duration / 10;
        println!("\nPer-character cost: {:?}", per_char);
        if per_char.as_millis() > 16 {
            println!("⚠️  CRITICAL: Typing will feel laggy (>16ms per keystroke)");
        }
    }
}

#[test]
fn bench_compile() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║                  COMPILE BENCHMARKS                            ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let catalog = KeywordCatalog::from_categories(Category::ALL);
    for (name, story) in story_sizes() {
        let result = benchmark(&format!("compile - {name}"), ITERATIONS, || {
            let tokens = compile(&story, &catalog);
            assert!(tokens.blank_count() >= story.chip_count());
        });
        result.print();
    }
}
