//! Starter configuration written by `sluice init`.

/// A `sluice.toml` for a project with ES2015 sources under `src/`, a
/// development tree under `app/` and a distributable tree under `dist/`.
pub const STARTER_CONFIG: &str = r#"# sluice build configuration

[settings]
debounce_ms = 300

[tasks]
default = ["connect", "watch"]
build = ["build:es6"]
dist = ["usemin"]
inject = ["inject:bower", "inject:local"]

[tasks."clean:dist"]
description = "Remove the distributable tree"
clean = ["dist"]

[tasks."clean:es6js"]
description = "Remove transpiled scripts and their sourcemaps"
clean = ["app/js/**/*.es6.js", "app/js/**/*.es6.js.map"]

[tasks.connect]
description = "Serve app/ with live reload"
serve = { root = "app", port = 8090, livereload = 35749 }

[tasks."connect:dist"]
description = "Serve the distributable tree"
depends_on = ["dist"]
serve = { root = "dist", port = 8091 }

[tasks.usemin]
description = "Bundle, minify and fingerprint the assets referenced by app/*.html"

[tasks.usemin.usemin]
src = ["app/*.html"]
dest = "dist"
css = ["minify-css", "concat"]
html = ["minify-html"]
js = ["minify-js", "rev"]

[tasks."build:es6"]
description = "Transpile src/**/*.es6 into app/js with sourcemaps"
depends_on = ["clean:es6js"]

[tasks."build:es6".pipeline]
src = ["src/**/*.es6"]
dest = "app/js"
steps = [{ command = "npx", args = ["babel", "--presets", "@babel/preset-env"] }]
sourcemaps = true
rename = { from = ".es6", to = ".es6.js" }

[tasks."inject:local"]
description = "Reference app scripts from app/index.html"
inject = { target = ["app/index.html"], sources = ["app/js/**/*.js", "!app/js/bower_components"], dest = "app" }

[tasks."inject:bower"]
description = "Reference bower main files from app/index.html"
inject = { target = ["app/index.html"], bower = true, name = "bower", dest = "app" }

[tasks.build-reload]
description = "Rebuild, then notify live-reload clients"
depends_on = ["build"]
reload = true

[tasks.watch]
description = "Rebuild on source changes"
watch = { globs = ["src/**/*.*"], tasks = ["build-reload"], initial = true }

[tasks."watch:dist"]
description = "Rebuild the distributable tree on changes under app/"
watch = { globs = ["app/**/*"], tasks = ["dist"] }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;

    #[test]
    fn test_starter_config_builds_a_valid_graph() {
        let config = BuildConfig::from_toml_str(STARTER_CONFIG).unwrap();
        let graph = config.to_graph().unwrap();
        graph.validate().unwrap();

        assert_eq!(graph.len(), 15);
        assert_eq!(
            graph.plan(&["build-reload"]).unwrap(),
            vec!["clean:es6js", "build:es6", "build", "build-reload"]
        );
        assert_eq!(graph.get("usemin").unwrap().action().kind(), "usemin");
        assert_eq!(graph.get("default").unwrap().action().kind(), "group");
    }
}
