use super::ast::SyntaxTree;
use crate::config::EngineConfig;
use crate::error::{ParseError, Result};
use crate::language::Dialect;
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;

/// Source of JS/TS syntax trees.
///
/// The extractor only talks to this trait, so tests can hand it canned trees.
pub trait SyntaxTreeProvider: Send + Sync {
    /// Parse source text into a program tree
    fn parse(&self, source: &str, dialect: Dialect) -> Result<SyntaxTree>;

    /// Human-readable engine name, used in logs
    fn name(&self) -> &str {
        "external"
    }
}

const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);
const PROBE_SCRIPT: &str = "require('@babel/parser')";

/// Reads the file named in argv and prints the program node as JSON.
///
/// Only Babel's own parse errors (they carry `loc`) become a structured `{error}` reply;
/// anything else escapes and exits non-zero. BigInt literal values are printed as strings.
const PARSE_SCRIPT: &str = r#"
const fs = require('fs');
const parser = require('@babel/parser');
const [file, dialect] = process.argv.slice(1);
const plugins = [
  'decorators-legacy',
  'classProperties',
  'asyncGenerators',
  'dynamicImport',
  'optionalChaining',
  'nullishCoalescingOperator',
  'exportDefaultFrom',
  ['estree', { classFeatures: true }],
];
if (dialect === 'javascript' || dialect === 'tsx') plugins.push('jsx');
if (dialect === 'typescript' || dialect === 'tsx') plugins.push('typescript');
let ast = null;
try {
  ast = parser.parse(fs.readFileSync(file, 'utf8'), {
    sourceType: 'module',
    allowImportExportEverywhere: true,
    allowReturnOutsideFunction: true,
    plugins,
  });
} catch (err) {
  if (!err || !err.loc) throw err;
  process.exitCode = 2;
  process.stdout.write(JSON.stringify({
    error: { message: String(err.message), line: err.loc.line || 1, column: (err.loc.column || 0) + 1 },
  }));
}
if (ast) {
  process.stdout.write(JSON.stringify(ast.program, (key, value) =>
    typeof value === 'bigint' ? value.toString() : value));
}
"#;

#[derive(Debug, Deserialize)]
struct EngineFailure {
    error: EngineDiagnostic,
}

#[derive(Debug, Deserialize)]
struct EngineDiagnostic {
    message: String,
    #[serde(default = "first")]
    line: usize,
    #[serde(default = "first")]
    column: usize,
}

const fn first() -> usize {
    1
}

/// `@babel/parser` driven through a Node.js child process
#[derive(Debug, Clone)]
pub struct BabelBridge {
    config: EngineConfig,
}

impl BabelBridge {
    /// Locate the engine, installing it once when `auto_install` is enabled.
    ///
    /// This is the only place that may touch the host environment; parse calls never do.
    pub fn initialize(config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        if Self::probe(config) {
            log::debug!("Babel parser found in {}", config.engine_dir.display());
            return Ok(Self {
                config: config.clone(),
            });
        }

        if !config.auto_install {
            return Err(ParseError::tooling_unavailable(format!(
                "@babel/parser not found for `{}` in {}; run `{} install --prefix {} @babel/parser` or enable engine.auto_install",
                config.node_program,
                config.engine_dir.display(),
                config.npm_program,
                config.engine_dir.display(),
            )));
        }

        log::warn!(
            "Babel parser not found, installing into {}",
            config.engine_dir.display()
        );
        Self::install(config)?;

        if Self::probe(config) {
            log::info!("Babel parser installed into {}", config.engine_dir.display());
            Ok(Self {
                config: config.clone(),
            })
        } else {
            Err(ParseError::tooling_unavailable(format!(
                "@babel/parser still unavailable after installing into {}",
                config.engine_dir.display()
            )))
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn probe(config: &EngineConfig) -> bool {
        if !config.engine_dir.is_dir() {
            return false;
        }

        let mut command = Command::new(&config.node_program);
        command
            .arg("-e")
            .arg(PROBE_SCRIPT)
            .current_dir(&config.engine_dir);

        match run_with_timeout(command, Duration::from_millis(config.timeout_ms)) {
            Ok(output) => output.status.success(),
            Err(e) => {
                log::debug!("Babel probe failed: {e}");
                false
            }
        }
    }

    fn install(config: &EngineConfig) -> Result<()> {
        std::fs::create_dir_all(&config.engine_dir)?;

        let mut command = Command::new(&config.npm_program);
        command
            .arg("install")
            .arg("--prefix")
            .arg(&config.engine_dir)
            .arg("--no-audit")
            .arg("--no-fund")
            .arg("@babel/parser");

        let output = run_with_timeout(command, INSTALL_TIMEOUT).map_err(|e| match e {
            ParseError::ToolingTimeout { .. } => {
                ParseError::tooling_unavailable("npm install timed out")
            }
            other => other,
        })?;

        if !output.status.success() {
            return Err(ParseError::tooling_unavailable(format!(
                "npm install failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn interpret(output: &Output) -> Result<SyntaxTree> {
        let value: serde_json::Value = match serde_json::from_slice(&output.stdout) {
            Ok(value) => value,
            Err(e) if output.status.success() => {
                return Err(ParseError::malformed_tree(format!(
                    "engine output is not JSON: {e}"
                )))
            }
            Err(_) => {
                return Err(ParseError::tooling_unavailable(format!(
                    "engine exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )))
            }
        };

        if value.get("error").is_some() {
            let failure: EngineFailure = serde_json::from_value(value)
                .map_err(|e| ParseError::malformed_tree(e.to_string()))?;
            let diag = failure.error;
            return Err(ParseError::syntax(diag.line, diag.column, diag.message));
        }

        serde_json::from_value(value).map_err(|e| ParseError::malformed_tree(e.to_string()))
    }
}

impl SyntaxTreeProvider for BabelBridge {
    fn parse(&self, source: &str, dialect: Dialect) -> Result<SyntaxTree> {
        let suffix = match dialect {
            Dialect::TypeScript => ".ts",
            Dialect::Tsx => ".tsx",
            _ => ".js",
        };

        // Removed when dropped, on every return path below
        let mut builder = tempfile::Builder::new();
        builder.prefix("codedoc-").suffix(suffix);
        let mut scratch = match &self.config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        scratch.write_all(source.as_bytes())?;
        scratch.flush()?;

        let mut command = Command::new(&self.config.node_program);
        command
            .arg("-e")
            .arg(PARSE_SCRIPT)
            .arg(scratch.path())
            .arg(dialect.as_str())
            .current_dir(&self.config.engine_dir);

        let output = run_with_timeout(command, Duration::from_millis(self.config.timeout_ms))?;
        Self::interpret(&output)
    }

    fn name(&self) -> &str {
        "babel"
    }
}

/// Run a child process to completion on a private current-thread runtime.
///
/// Once `limit` elapses the child is killed and reaped, and `ToolingTimeout` is returned.
/// Must not be called from inside another tokio runtime.
pub(crate) fn run_with_timeout(command: Command, limit: Duration) -> Result<Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_child(command, limit))
}

async fn run_child(mut command: Command, limit: Duration) -> Result<Output> {
    let program = command.as_std().get_program().to_string_lossy().to_string();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| ParseError::tooling_unavailable(format!("failed to start `{program}`: {e}")))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let finished = timeout(limit, async {
        let (status, stdout, stderr) =
            tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
        status.map(|status| Output {
            status,
            stdout,
            stderr,
        })
    })
    .await;

    match finished {
        Ok(output) => Ok(output?),
        Err(_) => {
            if let Err(e) = child.start_kill() {
                log::debug!("Failed to kill `{program}`: {e}");
            }
            let _ = child.wait().await;
            log::warn!("`{program}` exceeded {} ms, killed", limit.as_millis());
            Err(ParseError::ToolingTimeout {
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// Whether a directory already holds an installed `@babel/parser`
pub fn engine_installed(engine_dir: &Path) -> bool {
    engine_dir
        .join("node_modules")
        .join("@babel")
        .join("parser")
        .join("package.json")
        .is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    fn missing_engine_config() -> EngineConfig {
        EngineConfig {
            node_program: "codedoc-test-no-such-node-binary".to_string(),
            npm_program: "codedoc-test-no-such-npm-binary".to_string(),
            engine_dir: PathBuf::from("/nonexistent/codedoc-engine"),
            auto_install: false,
            timeout_ms: 1_000,
            scratch_dir: None,
        }
    }

    fn node_available() -> bool {
        std::process::Command::new("node")
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success())
    }

    /// Engine directory whose `@babel/parser` exports `parse_body` as its parse function
    struct FakeEngine {
        root: tempfile::TempDir,
        timeout_ms: u64,
    }

    impl FakeEngine {
        fn new(parse_body: &str) -> Self {
            let root = tempfile::tempdir().unwrap();
            let pkg = root.path().join("engine/node_modules/@babel/parser");
            std::fs::create_dir_all(&pkg).unwrap();
            std::fs::create_dir_all(root.path().join("scratch")).unwrap();
            std::fs::write(
                pkg.join("package.json"),
                r#"{"name":"@babel/parser","main":"index.js"}"#,
            )
            .unwrap();
            std::fs::write(
                pkg.join("index.js"),
                format!("exports.parse = (source, options) => {{ {parse_body} }};\n"),
            )
            .unwrap();
            Self {
                root,
                timeout_ms: 10_000,
            }
        }

        fn bridge(&self) -> BabelBridge {
            let config = EngineConfig {
                node_program: "node".to_string(),
                engine_dir: self.root.path().join("engine"),
                timeout_ms: self.timeout_ms,
                scratch_dir: Some(self.scratch_dir()),
                ..EngineConfig::default()
            };
            BabelBridge::initialize(&config).unwrap()
        }

        fn scratch_dir(&self) -> PathBuf {
            self.root.path().join("scratch")
        }

        fn assert_no_scratch_left(&self) {
            let left: Vec<_> = std::fs::read_dir(self.scratch_dir())
                .unwrap()
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name())
                .collect();
            assert!(left.is_empty(), "scratch files left behind: {left:?}");
        }
    }

    const PROGRAM_WITH_BIGINT: &str = r#"
        const loc = { start: { line: 1, column: 0 }, end: { line: 1, column: 16 } };
        return { program: { type: 'Program', body: [
          { type: 'VariableDeclaration', loc, declarations: [{
            type: 'VariableDeclarator', loc,
            id: { type: 'Identifier', name: 'big' },
            init: { type: 'Literal', value: BigInt(10), raw: '10n' },
          }] },
          { type: 'EnginePlugins', names: options.plugins.map((p) => Array.isArray(p) ? p[0] : p) },
        ] } };
    "#;

    #[test]
    fn test_missing_engine_is_unavailable() {
        let err = BabelBridge::initialize(&missing_engine_config()).unwrap_err();
        assert!(matches!(err, ParseError::ToolingUnavailable(_)), "{err:?}");
    }

    #[test]
    fn test_failed_install_is_unavailable() {
        let temp = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            engine_dir: temp.path().join("engine"),
            auto_install: true,
            ..missing_engine_config()
        };
        let err = BabelBridge::initialize(&config).unwrap_err();
        assert!(matches!(err, ParseError::ToolingUnavailable(_)), "{err:?}");
    }

    #[test]
    fn test_spawn_failure_is_unavailable() {
        let command = Command::new("codedoc-test-no-such-binary");
        let err = run_with_timeout(command, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ParseError::ToolingUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_child_times_out() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let started = Instant::now();
        let err = run_with_timeout(command, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ParseError::ToolingTimeout { timeout_ms: 100 }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_collected() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("printf '{\"body\":[]}'; echo oops >&2");
        let output = run_with_timeout(command, Duration::from_secs(5)).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"{\"body\":[]}");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "oops");
    }

    #[cfg(unix)]
    #[test]
    fn test_interpret_engine_outputs() {
        let run = |script: &str| {
            let mut command = Command::new("sh");
            command.arg("-c").arg(script);
            run_with_timeout(command, Duration::from_secs(5)).unwrap()
        };

        let tree = BabelBridge::interpret(&run("printf '{\"type\":\"Program\",\"body\":[{}]}'"))
            .unwrap();
        assert_eq!(tree.body.len(), 1);

        let err = BabelBridge::interpret(&run(
            "printf '{\"error\":{\"message\":\"Unexpected token (2:4)\",\"line\":2,\"column\":5}}'; exit 2",
        ))
        .unwrap_err();
        match err {
            ParseError::Syntax(diag) => {
                assert_eq!((diag.line, diag.column), (2, 5));
                assert!(diag.message.contains("Unexpected token"));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }

        let err = BabelBridge::interpret(&run("echo \"Cannot find module '@babel/parser'\" >&2; exit 1"))
            .unwrap_err();
        assert!(matches!(err, ParseError::ToolingUnavailable(_)));

        let err = BabelBridge::interpret(&run("printf 'not json'")).unwrap_err();
        assert!(matches!(err, ParseError::MalformedTree(_)));
    }

    #[test]
    fn test_engine_installed_detection() {
        let temp = tempfile::tempdir().unwrap();
        assert!(!engine_installed(temp.path()));

        let pkg = temp.path().join("node_modules/@babel/parser");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("package.json"), "{}").unwrap();
        assert!(engine_installed(temp.path()));
    }

    #[test]
    fn test_bigint_literal_is_serialized() {
        if !node_available() {
            return;
        }
        let engine = FakeEngine::new(PROGRAM_WITH_BIGINT);
        let tree = engine
            .bridge()
            .parse("const big = 10n;", Dialect::JavaScript)
            .unwrap();

        let init = &tree.body[0]["declarations"][0]["init"];
        assert_eq!(init["value"], "10");
        assert_eq!(init["raw"], "10n");
        engine.assert_no_scratch_left();
    }

    #[test]
    fn test_jsx_plugin_follows_dialect() {
        if !node_available() {
            return;
        }
        let engine = FakeEngine::new(PROGRAM_WITH_BIGINT);
        let bridge = engine.bridge();
        let plugins = |dialect: Dialect| -> Vec<String> {
            let tree = bridge.parse("", dialect).unwrap();
            serde_json::from_value(tree.body[1]["names"].clone()).unwrap()
        };

        let ts = plugins(Dialect::TypeScript);
        assert!(ts.contains(&"typescript".to_string()));
        assert!(!ts.contains(&"jsx".to_string()));

        let tsx = plugins(Dialect::Tsx);
        assert!(tsx.contains(&"typescript".to_string()));
        assert!(tsx.contains(&"jsx".to_string()));

        let js = plugins(Dialect::JavaScript);
        assert!(js.contains(&"jsx".to_string()));
        assert!(!js.contains(&"typescript".to_string()));
        engine.assert_no_scratch_left();
    }

    #[test]
    fn test_babel_parse_error_is_syntax_failure() {
        if !node_available() {
            return;
        }
        let engine = FakeEngine::new(
            "throw Object.assign(new SyntaxError('Unexpected token (2:4)'), { loc: { line: 2, column: 4 } });",
        );
        let err = engine
            .bridge()
            .parse("let a;\nlet (;", Dialect::JavaScript)
            .unwrap_err();
        match err {
            ParseError::Syntax(diag) => {
                assert_eq!((diag.line, diag.column), (2, 5));
                assert!(diag.message.contains("Unexpected token"));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
        engine.assert_no_scratch_left();
    }

    #[test]
    fn test_engine_crash_is_not_a_syntax_error() {
        if !node_available() {
            return;
        }
        let engine = FakeEngine::new("throw new Error('engine exploded');");
        let err = engine
            .bridge()
            .parse("function f() {}", Dialect::JavaScript)
            .unwrap_err();
        assert!(matches!(err, ParseError::ToolingUnavailable(_)), "{err:?}");
        assert!(err.to_string().contains("engine exploded"));
        engine.assert_no_scratch_left();
    }

    #[test]
    fn test_hanging_engine_times_out() {
        if !node_available() {
            return;
        }
        let mut engine = FakeEngine::new("for (;;) {}");
        engine.timeout_ms = 1_000;
        let bridge = engine.bridge();

        let started = Instant::now();
        let err = bridge.parse("function f() {}", Dialect::TypeScript).unwrap_err();
        assert!(matches!(err, ParseError::ToolingTimeout { timeout_ms: 1_000 }), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(8));
        engine.assert_no_scratch_left();
    }
}
