use anyhow::{bail, Context, Result};
use common::{EtlPipeline, PipelineConfig, PipelineFactory};
use std::{ffi::OsString, path::PathBuf, process::Command};
use tracing::debug;

/// Variable de entorno con la que el proceso ETL recibe la contraseña del store.
pub const PASSWORD_ENV: &str = "WIKIETL_DB_PASSWORD";

/// Engine ETL externo: un proceso del sistema por partición.
///
/// Cada pipeline ejecuta
/// `<programa> [args fijos] --lang L --page-fan P --rev-fan R --db-name N --db-user U <rutas...>`
/// y se considera fallido si el proceso no arranca o sale con código != 0.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Argumentos que van antes de los de la partición (ej: un subcomando).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    fn command(&self, config: &PipelineConfig) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--lang")
            .arg(&config.lang)
            .arg("--page-fan")
            .arg(config.page_fan.to_string())
            .arg("--rev-fan")
            .arg(config.rev_fan.to_string())
            .arg("--db-name")
            .arg(&config.db_name)
            .arg("--db-user")
            .arg(&config.db_user)
            .args(&config.paths)
            .env(PASSWORD_ENV, &config.db_password);
        cmd
    }
}

impl PipelineFactory for CommandEngine {
    fn create(&self, config: PipelineConfig) -> Box<dyn EtlPipeline> {
        Box::new(CommandPipeline {
            command: self.command(&config),
            program: self.program.clone(),
            partition: config.partition,
        })
    }
}

struct CommandPipeline {
    command: Command,
    program: PathBuf,
    partition: usize,
}

impl EtlPipeline for CommandPipeline {
    fn run(mut self: Box<Self>) -> Result<()> {
        debug!(
            "partición {}: ejecutando {}",
            self.partition,
            self.program.display()
        );

        let status = self.command.status().with_context(|| {
            format!(
                "no se pudo lanzar el proceso ETL {} para la partición {}",
                self.program.display(),
                self.partition
            )
        })?;

        if !status.success() {
            bail!(
                "el proceso ETL de la partición {} terminó con {}",
                self.partition,
                status
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, ffi::OsStr, fs};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("engine_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            partition: 1,
            paths: vec![PathBuf::from("/d/a.7z"), PathBuf::from("/d/b.7z")],
            lang: "scowiki".into(),
            page_fan: 2,
            rev_fan: 4,
            db_name: "scowiki_20240101".into(),
            db_user: "wikidat".into(),
            db_password: "s3cr3t".into(),
        }
    }

    #[test]
    fn command_arma_argumentos_y_pasa_la_contrasena_por_entorno() {
        let engine = CommandEngine::new("wikidat-etl").with_args(["load"]);
        let cmd = engine.command(&config());

        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(
            args,
            vec![
                "load", "--lang", "scowiki", "--page-fan", "2", "--rev-fan", "4", "--db-name",
                "scowiki_20240101", "--db-user", "wikidat", "/d/a.7z", "/d/b.7z",
            ]
            .into_iter()
            .map(OsStr::new)
            .collect::<Vec<_>>()
        );
        assert!(!args.iter().any(|a| *a == OsStr::new("s3cr3t")));

        let env: Vec<_> = cmd.get_envs().collect();
        assert_eq!(env, vec![(OsStr::new(PASSWORD_ENV), Some(OsStr::new("s3cr3t")))]);
    }

    #[cfg(unix)]
    #[test]
    fn proceso_recibe_los_archivos_de_la_particion() {
        let dir = temp_dir("recibe_archivos");
        let out = dir.join("args.txt");
        let script = format!(
            "printf '%s\\n' \"$@\" > '{}'; echo \"$WIKIETL_DB_PASSWORD\" >> '{}'",
            out.display(),
            out.display()
        );

        let engine = CommandEngine::new("sh").with_args(["-c", script.as_str(), "etl"]);
        engine.create(config()).run().unwrap();

        let written = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "--lang");
        assert_eq!(&lines[lines.len() - 3..], &["/d/a.7z", "/d/b.7z", "s3cr3t"]);
    }

    #[cfg(unix)]
    #[test]
    fn codigo_de_salida_distinto_de_cero_es_fallo() {
        let engine = CommandEngine::new("sh").with_args(["-c", "exit 3", "etl"]);
        let err = engine.create(config()).run().unwrap_err();

        assert!(err.to_string().contains("partición 1"));
    }

    #[test]
    fn programa_inexistente_es_fallo() {
        let engine = CommandEngine::new("/no/existe/wikidat-etl");
        let err = engine.create(config()).run().unwrap_err();

        assert!(format!("{err:#}").contains("no se pudo lanzar"));
    }
}
