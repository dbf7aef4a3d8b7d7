//! Integration tests for CLI commands

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

/// Helper to run kubeplate command
fn kubeplate(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_kubeplate"))
        .args(args)
        .env_remove("KUBEPLATE_STATIC_PATH")
        .env_remove("KUBEPLATE_LOG")
        .output()
        .expect("Failed to execute kubeplate")
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(root: &str, aux: &str, values: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("root.yaml"), root).unwrap();
        fs::write(dir.path().join("_helpers.tpl"), aux).unwrap();
        fs::write(dir.path().join("values.yaml"), values).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn arg(&self, name: &str) -> String {
        self.path(name).display().to_string()
    }

    fn render(&self, extra: &[&str]) -> std::process::Output {
        let root = self.arg("root.yaml");
        let aux = self.arg("_helpers.tpl");
        let values = self.arg("values.yaml");
        let mut args = vec!["render", root.as_str(), aux.as_str(), "-f", values.as_str()];
        args.extend_from_slice(extra);
        kubeplate(&args)
    }
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

mod render_command {
    use super::*;

    const ROOT: &str = r#"kind: ConfigMap
metadata:
  name: {{ Values.name }}
  namespace: {{ Values.namespace }}
  labels:
    {{- include("labels", Values) | nindent(4) }}
---
kind: Namespace
metadata:
  name: {{ Values.namespace }}
"#;

    const AUX: &str = r#"{%- define "labels" -%}
app: {{ name }}
{%- enddefine %}
"#;

    #[test]
    fn test_render_yaml_stream() {
        let ws = Workspace::new(ROOT, AUX, "name: web\n");
        let output = ws.render(&["-n", "demo"]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        insta::assert_snapshot!(stdout(&output), @r"
        kind: ConfigMap
        metadata:
          name: web
          namespace: demo
          labels:
            app: web
        ---
        kind: Namespace
        metadata:
          name: demo
        ");
    }

    #[test]
    fn test_render_json() {
        let ws = Workspace::new(ROOT, AUX, "name: web\n");
        let output = ws.render(&["--json", "--set", "name=api"]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let json: serde_json::Value =
            serde_json::from_str(&stdout(&output)).expect("Output should be valid JSON");
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["metadata"]["name"], "api");
        assert_eq!(json[1]["metadata"]["name"], "default");
    }

    #[test]
    fn test_render_output_dir() {
        let ws = Workspace::new(ROOT, AUX, "name: web\n");
        let out = ws.arg("out");
        let output = ws.render(&["-n", "demo", "--output-dir", &out]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(ws.path("out/000-configmap-web.yaml").exists());
        assert!(ws.path("out/001-namespace-demo.yaml").exists());
        assert!(stderr(&output).contains("wrote"));
    }

    #[test]
    fn test_render_static_files() {
        let ws = Workspace::new(
            r#"data: {{ Files().GetConfig("app.conf") | nindent(2) }}"#,
            "",
            "{}",
        );
        let assets = ws.path("assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("app.conf"), "listen 80;").unwrap();

        let assets = assets.display().to_string();
        let output = ws.render(&["--static-dir", &assets, "--json"]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        assert_eq!(json[0]["data"]["app.conf"], "listen 80;");
    }

    #[test]
    fn test_deep_self_include() {
        let ws = Workspace::new(
            "data: {{ include(\"loop\") }}\n",
            r#"{% define "loop" %}x{{ include("loop") }}{% enddefine %}"#,
            "{}",
        );
        let output = ws.render(&["--json"]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        assert_eq!(json[0]["data"].as_str().map(str::len), Some(1001));
    }

    #[test]
    fn test_keep_empty_flag() {
        let ws = Workspace::new("---\nkind: A\n", "", "{}");

        let dropped = ws.render(&["--json"]);
        let kept = ws.render(&["--json", "--keep-empty"]);

        let dropped: serde_json::Value = serde_json::from_str(&stdout(&dropped)).unwrap();
        let kept: serde_json::Value = serde_json::from_str(&stdout(&kept)).unwrap();
        assert_eq!(dropped.as_array().unwrap().len(), 1);
        assert_eq!(kept.as_array().unwrap().len(), 2);
    }
}

mod exit_codes {
    use super::*;

    #[test]
    fn test_missing_values_file() {
        let ws = Workspace::new("kind: A", "", "{}");
        let root = ws.arg("root.yaml");
        let aux = ws.arg("_helpers.tpl");
        let output = kubeplate(&["render", &root, &aux, "-f", "/nonexistent/values.yaml"]);

        assert_eq!(output.status.code(), Some(5));
    }

    #[test]
    fn test_template_syntax_error() {
        let ws = Workspace::new("{{ Values.name ", "", "{}");
        let output = ws.render(&[]);

        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_undefined_value() {
        let ws = Workspace::new("name: {{ Values.missing.name }}", "", "{}");
        let output = ws.render(&[]);

        assert_eq!(output.status.code(), Some(3));
        assert!(stderr(&output).contains("undefined"));
    }

    #[test]
    fn test_sandboxed_function() {
        let ws = Workspace::new(r#"home: {{ env("HOME") }}"#, "", "{}");
        let output = ws.render(&[]);

        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_invalid_document() {
        let ws = Workspace::new("kind: A\n---\njust text\n", "", "{}");
        let output = ws.render(&[]);

        assert_eq!(output.status.code(), Some(2));
        assert!(stdout(&output).is_empty());
    }

    #[test]
    fn test_bad_set_value() {
        let ws = Workspace::new("kind: A", "", "{}");
        let output = ws.render(&["--set", "novalue"]);

        assert_eq!(output.status.code(), Some(64));
    }

    #[test]
    fn test_unknown_flag() {
        let output = kubeplate(&["render", "--nope"]);
        assert_eq!(output.status.code(), Some(64));
    }
}

mod functions_command {
    use super::*;

    #[test]
    fn test_functions_listing() {
        let output = kubeplate(&["functions"]);

        assert!(output.status.success());
        let out = stdout(&output);
        assert!(out.contains("toYaml"));
        assert!(out.contains("include"));
    }

    #[test]
    fn test_functions_json() {
        let output = kubeplate(&["functions", "--json"]);

        let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        let functions: Vec<&str> = json["functions"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(functions.contains(&"toToml"));
        assert!(!functions.contains(&"env"));
        assert_eq!(json["removed"], serde_json::json!(["env", "expandenv"]));
    }
}

