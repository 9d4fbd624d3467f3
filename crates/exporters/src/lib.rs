use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::FileOptions;
use zip::ZipWriter;

use storyboard::{Project, Shot, StoryboardError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip write error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("frame decode error: {0}")]
    Frame(#[from] StoryboardError),
}

pub const FRAMES_DIR: &str = "production_frames";
pub const SCRIPT_FILE: &str = "MASTER_PRODUCTION_SCRIPT.txt";

/// The flat production transcript: shots in sequence order, one block per
/// shot, separated by rules.
pub fn render_script(project: &Project) -> String {
    project
        .sorted_shots()
        .iter()
        .map(|shot| {
            format!(
                "{}. [{}]\nVisual Analysis: {}\nProduction Prompt: {}",
                shot.sequence_order, shot.topic, shot.visual_analysis, shot.action_prompt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// `"Night Market" -> "Night_Market_Master_Pack.zip"`
pub fn pack_file_name(title: &str) -> String {
    let stem: Vec<&str> = title.split_whitespace().collect();
    format!("{}_Master_Pack.zip", stem.join("_"))
}

/// Writes the master pack archive: every shot's start/end frames under
/// `production_frames/` with zero-padded sequence numbers, plus the
/// transcript as a flat text file.
pub fn write_master_pack<W: Write + Seek>(project: &Project, writer: W) -> Result<(), ExportError> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default();

    for shot in project.sorted_shots() {
        let num = format!("{:03}", shot.sequence_order);
        zip.start_file(
            format!("{FRAMES_DIR}/SHOT_{num}_A_START.{}", frame_extension(shot, true)),
            options,
        )?;
        zip.write_all(&shot.source_image.decode()?)?;
        zip.start_file(
            format!("{FRAMES_DIR}/SHOT_{num}_B_END.{}", frame_extension(shot, false)),
            options,
        )?;
        zip.write_all(&shot.target_image.decode()?)?;
    }

    zip.start_file(SCRIPT_FILE, options)?;
    zip.write_all(render_script(project).as_bytes())?;
    zip.finish()?;
    Ok(())
}

/// Convenience wrapper writing the pack to a file on disk.
pub fn export_master_pack(project: &Project, path: &Path) -> Result<(), ExportError> {
    let file = BufWriter::new(File::create(path)?);
    write_master_pack(project, file)
}

fn frame_extension(shot: &Shot, start: bool) -> &'static str {
    let mime = if start {
        shot.source_image.mime()
    } else {
        shot.target_image.mime()
    };
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use storyboard::ImageRef;
    use zip::ZipArchive;

    fn shot(seq: i64, topic: &str) -> Shot {
        Shot::new(
            seq,
            topic,
            format!("analysis {seq}"),
            format!("prompt {seq}"),
            ImageRef::from_bytes("image/png", format!("start-{seq}").as_bytes()),
            ImageRef::from_bytes("image/jpeg", format!("end-{seq}").as_bytes()),
        )
    }

    #[test]
    fn script_renders_in_sequence_order() {
        let mut project = Project::new("Script");
        project.shots.push(shot(2, "second"));
        project.shots.push(shot(1, "first"));

        let script = render_script(&project);
        assert_eq!(
            script,
            "1. [first]\nVisual Analysis: analysis 1\nProduction Prompt: prompt 1\n\n---\n\n\
             2. [second]\nVisual Analysis: analysis 2\nProduction Prompt: prompt 2"
        );
    }

    #[test]
    fn pack_contains_padded_frames_and_transcript() {
        let mut project = Project::new("Pack");
        project.shots.push(shot(7, "beat"));

        let mut buffer = Cursor::new(Vec::new());
        write_master_pack(&project, &mut buffer).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(buffer.into_inner())).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "MASTER_PRODUCTION_SCRIPT.txt".to_string(),
                "production_frames/SHOT_007_A_START.png".to_string(),
                "production_frames/SHOT_007_B_END.jpg".to_string(),
            ]
        );

        let mut start = Vec::new();
        archive
            .by_name("production_frames/SHOT_007_A_START.png")
            .unwrap()
            .read_to_end(&mut start)
            .unwrap();
        assert_eq!(start, b"start-7");

        let mut script = String::new();
        archive
            .by_name("MASTER_PRODUCTION_SCRIPT.txt")
            .unwrap()
            .read_to_string(&mut script)
            .unwrap();
        assert!(script.starts_with("7. [beat]"));
    }

    #[test]
    fn pack_file_name_collapses_whitespace() {
        assert_eq!(pack_file_name("Night  Market "), "Night_Market_Master_Pack.zip");
        assert_eq!(pack_file_name("Solo"), "Solo_Master_Pack.zip");
    }
}
