use crate::docker::docker_models::{DockerSupportedLanguage, LaunchPlan};
use crate::models::config_models::Config;

/// Fixed execution recipe per language. The submitted code is uploaded as
/// the entry file named here and run by the argv below; no user byte is
/// ever part of a command line, so there is nothing to escape.
pub fn generate_launch_plan(language: DockerSupportedLanguage) -> LaunchPlan {
    let config = Config::global();
    let workdir = &config.constants.sandbox_workdir;
    let image = format!("{}_{}", config.constants.executor_image_prefix, language);

    match language {
        DockerSupportedLanguage::Python => LaunchPlan {
            image,
            entry_file_name: "main.py",
            command: vec!["python3".to_string(), format!("{}/main.py", workdir)],
        },
        DockerSupportedLanguage::JavaScript => LaunchPlan {
            image,
            entry_file_name: "main.js",
            command: vec!["node".to_string(), format!("{}/main.js", workdir)],
        },
        // Single-file source launch; the java image must ship a JDK.
        DockerSupportedLanguage::Java => LaunchPlan {
            image,
            entry_file_name: "Main.java",
            command: vec!["java".to_string(), format!("{}/Main.java", workdir)],
        },
    }
}
