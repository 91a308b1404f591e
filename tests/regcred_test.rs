use pretty_assertions::assert_eq;

use regcred_diagram::diagram::Direction;
use regcred_diagram::regcred::regcred_injector;
use regcred_diagram::{Format, RenderOptions, render, write_to_dir};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

const NODE_LABELS: [&str; 6] = [
    "Control Plane",
    "DockerHub",
    "regcred-injector",
    "Credential/Certs",
    "new-pod",
    "regcred",
];

const EDGE_LABELS: [&str; 7] = [
    "1 mutate webhook",
    "2 fetch credential",
    "3 create registry credential",
    "4 return mutated response",
    "5 create pod",
    "6 use registry credential",
    "7 authenticated pull",
];

fn options(format: Format) -> RenderOptions {
    RenderOptions {
        format,
        ..RenderOptions::default()
    }
}

fn render_string(format: Format) -> String {
    let bytes = render(&regcred_injector().unwrap(), &options(format)).unwrap();
    String::from_utf8(bytes).unwrap()
}

// =============================================================================
// Output files
// =============================================================================

#[test]
fn default_render_writes_named_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_to_dir(&regcred_injector().unwrap(), dir.path(), &RenderOptions::default())
        .unwrap();

    assert_eq!(path, dir.path().join("regcred-injector.png"));
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.len() > PNG_SIGNATURE.len());
    assert_eq!(bytes[..8], PNG_SIGNATURE);
}

#[test]
fn every_format_writes_a_non_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let diagram = regcred_injector().unwrap();
    for (format, name) in [
        (Format::Svg, "regcred-injector.svg"),
        (Format::Dot, "regcred-injector.dot"),
        (Format::Text, "regcred-injector.txt"),
    ] {
        let path = write_to_dir(&diagram, dir.path(), &options(format)).unwrap();
        assert_eq!(path.file_name().unwrap(), name);
        assert!(std::fs::metadata(&path).unwrap().len() > 0, "{name} is empty");
    }
}

#[test]
fn rerender_overwrites_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let diagram = regcred_injector().unwrap();
    let first = write_to_dir(&diagram, dir.path(), &options(Format::Svg)).unwrap();
    let second = write_to_dir(&diagram, dir.path(), &options(Format::Svg)).unwrap();
    assert_eq!(first, second);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn missing_output_directory_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let err = write_to_dir(&regcred_injector().unwrap(), &missing, &options(Format::Text))
        .unwrap_err();
    assert!(matches!(err, regcred_diagram::Error::Io(_)), "got: {err}");
}

// =============================================================================
// Content
// =============================================================================

#[test]
fn svg_shows_every_label() {
    let svg = render_string(Format::Svg);
    for label in NODE_LABELS.iter().chain(&EDGE_LABELS) {
        assert!(svg.contains(label), "missing `{label}`");
    }
    assert!(svg.contains("kube-system"));
    assert!(svg.contains("default"));
}

#[test]
fn text_shows_every_label() {
    let text = render_string(Format::Text);
    for label in NODE_LABELS.iter().chain(&EDGE_LABELS) {
        assert!(text.contains(label), "missing `{label}` in:\n{text}");
    }
    assert!(text.contains("┌─ kube-system ─"));
    assert!(text.contains("┌─ default ─"));
    assert!(text.trim_end().ends_with("regcred-injector"));
}

#[test]
fn text_top_down_shows_every_label() {
    let opts = RenderOptions {
        format: Format::Text,
        direction: Some(Direction::TopDown),
        ..RenderOptions::default()
    };
    let bytes = render(&regcred_injector().unwrap(), &opts).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    for label in NODE_LABELS.iter().chain(&EDGE_LABELS) {
        assert!(text.contains(label), "missing `{label}` in:\n{text}");
    }
    assert!(text.contains("┌─ kube-system "), "got:\n{text}");
    assert!(text.contains("┌─ default "), "got:\n{text}");
}

#[test]
fn text_flow_reads_left_to_right() {
    let text = render_string(Format::Text);
    let line = text
        .lines()
        .find(|l| l.contains("Control Plane"))
        .unwrap();
    let api = line.find("Control Plane").unwrap();
    let injector = line.find("regcred-injector").unwrap();
    let registry = line.find("DockerHub").unwrap();
    assert!(api < injector && injector < registry, "got:\n{text}");
}

#[test]
fn png_scale_grows_the_image() {
    let diagram = regcred_injector().unwrap();
    let small = render(&diagram, &options(Format::Png)).unwrap();
    let large = render(
        &diagram,
        &RenderOptions {
            scale: 2.0,
            ..RenderOptions::default()
        },
    )
    .unwrap();
    let width = |png: &[u8]| u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
    assert_eq!(width(&large), width(&small) * 2);
}

#[test]
fn dot_output_lists_both_namespaces() {
    let dot = render_string(Format::Dot);
    assert!(dot.starts_with("digraph \"regcred-injector\" {"));
    assert_eq!(dot.matches("subgraph cluster_").count(), 2);
    assert_eq!(dot.matches(" -> ").count(), EDGE_LABELS.len());
}
