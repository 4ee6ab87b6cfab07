use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use roxmltree::{Document, Node};
use tracing::{debug, info};

use crate::world::{GameTuning, Vec2};

use super::database::{DefDatabase, LevelDef};
use super::hashing::DefsHasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

/// Compiles every `*.xml` under `defs_dir` (sorted by relative path) into a
/// database. A `<TuningDef>` overrides individual `GameTuning` fields; each
/// `<LevelDef>` adds one catalog entry.
pub fn compile_def_database(defs_dir: &Path) -> Result<DefDatabase, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(defs_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut tuning = GameTuning::default();
    let mut tuning_source: Option<PathBuf> = None;
    let mut levels = BTreeMap::<u32, LevelDef>::new();
    let mut hasher = DefsHasher::new();

    for xml_file in &xml_files {
        let raw = fs::read_to_string(xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        hasher.update(&relative_name(defs_dir, xml_file), raw.as_bytes());

        let doc = parse_document(xml_file, &raw)?;
        let ctx = NodeContext {
            file_path: xml_file,
            doc: &doc,
        };
        let root = doc.root_element();
        if root.tag_name().name() != "Defs" {
            return Err(ctx.error(
                ContentErrorCode::InvalidRoot,
                "root element must be <Defs>".to_string(),
                root,
            ));
        }

        for child in root.children().filter(|node| node.is_element()) {
            match child.tag_name().name() {
                "TuningDef" => {
                    if let Some(previous) = &tuning_source {
                        return Err(ctx.error(
                            ContentErrorCode::DuplicateDef,
                            format!(
                                "second <TuningDef>; the first one is in {}",
                                previous.display()
                            ),
                            child,
                        ));
                    }
                    apply_tuning_def(&ctx, child, &mut tuning)?;
                    tuning_source = Some(xml_file.clone());
                }
                "LevelDef" => {
                    let level = parse_level_def(&ctx, child)?;
                    if levels.contains_key(&level.id) {
                        return Err(ctx.error(
                            ContentErrorCode::DuplicateDef,
                            format!("duplicate LevelDef id {}", level.id),
                            child,
                        ));
                    }
                    levels.insert(level.id, level);
                }
                other => {
                    return Err(ctx.error(
                        ContentErrorCode::UnknownDefType,
                        format!(
                            "unsupported def type <{other}>; expected <TuningDef> or <LevelDef>"
                        ),
                        child,
                    ));
                }
            }
        }
    }

    let database = DefDatabase::new(tuning, levels.into_values().collect(), hasher.finish());
    info!(
        defs_dir = %defs_dir.display(),
        files = xml_files.len(),
        levels = database.level_count(),
        tuning_overridden = tuning_source.is_some(),
        defs_hash = database.source_hash(),
        "defs_compiled"
    );
    Ok(database)
}

struct NodeContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl NodeContext<'_, '_> {
    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn finite_number(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<f32, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        match value.parse::<f32>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' is not a finite number"),
                node,
            )),
        }
    }

    fn non_negative(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<f32, ContentCompileError> {
        let value = self.finite_number(node, field_name)?;
        if value < 0.0 {
            return Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} must be >= 0"),
                node,
            ));
        }
        Ok(value)
    }

    fn millis(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<Duration, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| {
                self.error(
                    ContentErrorCode::InvalidValue,
                    format!("{field_name} '{value}' is not a whole number of milliseconds"),
                    node,
                )
            })
    }
}

fn parse_document<'input>(
    file_path: &Path,
    raw: &'input str,
) -> Result<Document<'input>, ContentCompileError> {
    Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })
}

fn apply_tuning_def(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
    tuning: &mut GameTuning,
) -> Result<(), ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    for field in node.children().filter(|child| child.is_element()) {
        let name = field.tag_name().name();
        if !seen_fields.insert(name.to_string()) {
            return Err(ctx.error(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{name}> in <TuningDef>"),
                field,
            ));
        }

        match name {
            "playerRunSpeed" => tuning.player.run_speed = ctx.non_negative(field, name)?,
            "playerGravity" => tuning.player.gravity = ctx.non_negative(field, name)?,
            "playerJumpImpulse" => tuning.player.jump_impulse = ctx.finite_number(field, name)?,
            "playerDoubleJumpSlack" => {
                tuning.player.double_jump_slack = ctx.non_negative(field, name)?
            }
            "playerMaxHealth" => tuning.player.max_health = ctx.non_negative(field, name)?,
            "playerInvincibilityMs" => tuning.player.invincibility = ctx.millis(field, name)?,
            "enemySpeed" => tuning.enemy.speed = ctx.non_negative(field, name)?,
            "enemyDamage" => tuning.enemy.damage = ctx.non_negative(field, name)?,
            "stompBounce" => tuning.enemy.stomp_bounce = ctx.finite_number(field, name)?,
            "spikeDamage" => tuning.hazard.spike_damage = ctx.non_negative(field, name)?,
            "spikeBounce" => tuning.hazard.spike_bounce = ctx.finite_number(field, name)?,
            "bottleHeal" => tuning.hazard.bottle_heal = ctx.non_negative(field, name)?,
            "fallDeathMargin" => tuning.hazard.fall_death_margin = ctx.non_negative(field, name)?,
            "pauseDelayMs" => tuning.session.pause_delay = ctx.millis(field, name)?,
            "cameraBorderLeft" => tuning.camera.border_left = ctx.non_negative(field, name)?,
            "cameraBorderRight" => tuning.camera.border_right = ctx.non_negative(field, name)?,
            "cameraBorderTop" => tuning.camera.border_top = ctx.non_negative(field, name)?,
            "cameraBorderBottom" => tuning.camera.border_bottom = ctx.non_negative(field, name)?,
            _ => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{name}> in <TuningDef>"),
                    field,
                ))
            }
        }
        debug!(field = name, "tuning_override_applied");
    }
    Ok(())
}

fn parse_level_def(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<LevelDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut id: Option<u32> = None;
    let mut label: Option<String> = None;
    let mut directory: Option<String> = None;
    let mut node_x: Option<f32> = None;
    let mut node_y: Option<f32> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let name = field.tag_name().name();
        if !seen_fields.insert(name.to_string()) {
            return Err(ctx.error(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{name}> in <LevelDef>"),
                field,
            ));
        }

        match name {
            "id" => {
                let value = ctx.required_text(field, name)?;
                let parsed = value.parse::<u32>().ok().filter(|parsed| *parsed >= 1);
                let Some(parsed) = parsed else {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        format!("level id '{value}' must be a positive integer"),
                        field,
                    ));
                };
                id = Some(parsed);
            }
            "label" => label = Some(ctx.required_text(field, name)?),
            "directory" => {
                let value = ctx.required_text(field, name)?;
                if value.contains(['/', '\\']) || value == ".." {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        format!("directory '{value}' must be a single path component"),
                        field,
                    ));
                }
                directory = Some(value);
            }
            "nodeX" => node_x = Some(ctx.finite_number(field, name)?),
            "nodeY" => node_y = Some(ctx.finite_number(field, name)?),
            _ => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{name}> in <LevelDef>"),
                    field,
                ))
            }
        }
    }

    let missing = |field_name: &str| {
        ctx.error(
            ContentErrorCode::MissingField,
            format!("missing required field <{field_name}> in <LevelDef>"),
            node,
        )
    };
    let id = id.ok_or_else(|| missing("id"))?;
    let directory = directory.ok_or_else(|| missing("directory"))?;

    Ok(LevelDef {
        id,
        label: label.unwrap_or_else(|| format!("Level {id}")),
        directory,
        node: Vec2::new(node_x.unwrap_or_default(), node_y.unwrap_or_default()),
    })
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_cached_key(|path| relative_name(root, path));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read defs: {source}"),
        file_path: path,
        location: None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::world::{Player, PlayerProgress};

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn defs_dir(temp: &TempDir) -> PathBuf {
        let dir = temp.path().join("defs");
        fs::create_dir_all(&dir).expect("defs dir");
        dir
    }

    fn shipped_defs_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("assets")
            .join("base")
            .join("defs")
    }

    #[test]
    fn levels_are_sorted_by_id_across_files() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(
            &dir.join("b.xml"),
            r#"<Defs><LevelDef><id>1</id><directory>level_1</directory></LevelDef></Defs>"#,
        );
        write_file(
            &dir.join("a.xml"),
            r#"<Defs>
                <LevelDef><id>3</id><directory>level_3</directory><nodeX>40</nodeX><nodeY>8</nodeY></LevelDef>
            </Defs>"#,
        );

        let db = compile_def_database(&dir).expect("compile");
        let ids = db.levels().iter().map(|level| level.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 3]);
        let third = db.level(3).expect("level 3");
        assert_eq!(third.node, Vec2::new(40.0, 8.0));
        assert_eq!(third.label, "Level 3");
        assert_eq!(db.tuning(), GameTuning::default());
    }

    #[test]
    fn tuning_def_overrides_only_named_fields() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(
            &dir.join("tuning.xml"),
            r#"<Defs><TuningDef>
                <playerRunSpeed>8</playerRunSpeed>
                <pauseDelayMs>900</pauseDelayMs>
            </TuningDef></Defs>"#,
        );

        let db = compile_def_database(&dir).expect("compile");
        let tuning = db.tuning();
        assert!((tuning.player.run_speed - 8.0).abs() < f32::EPSILON);
        assert_eq!(tuning.session.pause_delay, Duration::from_millis(900));
        assert_eq!(tuning.enemy, GameTuning::default().enemy);
    }

    #[test]
    fn missing_directory_reports_file_and_location() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(
            &dir.join("levels.xml"),
            r#"<Defs><LevelDef><id>1</id></LevelDef></Defs>"#,
        );
        let err = compile_def_database(&dir).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert!(err.file_path.ends_with("levels.xml"));
        assert!(err.location.is_some());
    }

    #[test]
    fn unknown_field_errors() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(
            &dir.join("tuning.xml"),
            r#"<Defs><TuningDef><moonGravity>0.2</moonGravity></TuningDef></Defs>"#,
        );
        let err = compile_def_database(&dir).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownField);
    }

    #[test]
    fn invalid_number_errors() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(
            &dir.join("tuning.xml"),
            r#"<Defs><TuningDef><enemySpeed>-2</enemySpeed></TuningDef></Defs>"#,
        );
        let err = compile_def_database(&dir).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(&dir.join("defs.xml"), r#"<Defs><LevelDef><id>1</id></Defs>"#);
        let err = compile_def_database(&dir).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn wrong_root_and_unknown_def_type_error() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(&dir.join("defs.xml"), r#"<Levels/>"#);
        let err = compile_def_database(&dir).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidRoot);

        write_file(&dir.join("defs.xml"), r#"<Defs><EntityDef/></Defs>"#);
        let err = compile_def_database(&dir).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownDefType);
    }

    #[test]
    fn duplicate_level_id_errors() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(
            &dir.join("defs.xml"),
            r#"<Defs>
                <LevelDef><id>2</id><directory>a</directory></LevelDef>
                <LevelDef><id>2</id><directory>b</directory></LevelDef>
            </Defs>"#,
        );
        let err = compile_def_database(&dir).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDef);
    }

    #[test]
    fn second_tuning_def_errors() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(&dir.join("a.xml"), r#"<Defs><TuningDef/></Defs>"#);
        write_file(&dir.join("b.xml"), r#"<Defs><TuningDef/></Defs>"#);
        let err = compile_def_database(&dir).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDef);
        assert!(err.file_path.ends_with("b.xml"));
    }

    #[test]
    fn source_hash_tracks_file_contents() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        let path = dir.join("defs.xml");
        write_file(
            &path,
            r#"<Defs><LevelDef><id>1</id><directory>a</directory></LevelDef></Defs>"#,
        );
        let first = compile_def_database(&dir).expect("first");
        let again = compile_def_database(&dir).expect("again");
        write_file(
            &path,
            r#"<Defs><LevelDef><id>1</id><directory>b</directory></LevelDef></Defs>"#,
        );
        let changed = compile_def_database(&dir).expect("changed");

        assert_eq!(first.source_hash(), again.source_hash());
        assert_ne!(first.source_hash(), changed.source_hash());
    }

    #[test]
    fn missing_defs_dir_is_read_error() {
        let temp = TempDir::new().expect("temp");
        let err = compile_def_database(&temp.path().join("absent")).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::ReadFile);
    }

    #[test]
    fn shipped_defs_compile() {
        let db = compile_def_database(&shipped_defs_dir()).expect("shipped defs");
        assert!(db.level_count() >= 1);
        assert!(db.level(1).is_some());
    }

    #[test]
    fn tuned_max_health_caps_a_new_game_player() {
        let temp = TempDir::new().expect("temp");
        let dir = defs_dir(&temp);
        write_file(
            &dir.join("tuning.xml"),
            r#"<Defs><TuningDef><playerMaxHealth>150</playerMaxHealth></TuningDef></Defs>"#,
        );

        let tuning = compile_def_database(&dir).expect("compile").tuning();
        let progress = PlayerProgress::new_game(1, &tuning.player);
        let player = Player::new(
            Vec2::ZERO,
            tuning.player,
            progress.abilities,
            progress.max_health as f32,
        );

        assert_eq!(progress.max_health, 150);
        assert_eq!(player.max_health(), 150.0);
        assert_eq!(player.health(), 150.0);
    }
}
