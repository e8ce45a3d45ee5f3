//! Argument synthesis: JVM flags, classpath, main class, and game arguments, with
//! placeholder substitution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::os::Os;
use crate::version::VersionDescriptor;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no main class resolved for launch")]
    MissingMainClass,
}

/// A pre-resolved authorization record (credential acquisition is out of scope; the
/// caller supplies this already-obtained token).
#[derive(Debug, Clone)]
pub struct Authorization {
    pub access_token: String,
    pub name: String,
    pub uuid: String,
    pub user_properties: String,
}

#[derive(Debug, Clone, Copy)]
pub enum Window {
    Fullscreen,
    Sized { width: u32, height: u32 },
}

#[derive(Debug, Clone)]
pub struct ServerJoin {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Everything the argument synthesizer needs beyond the resolved descriptors.
#[derive(Debug, Clone)]
pub struct ArgsContext {
    pub root: PathBuf,
    pub version_number: String,
    pub version_type: String,
    pub authorization: Authorization,
    pub memory_min_mb: u32,
    pub memory_max_mb: u32,
    pub natives_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub custom_args: Vec<String>,
    pub custom_launch_args: Vec<String>,
    pub window: Option<Window>,
    pub server: Option<ServerJoin>,
    pub proxy: Option<Proxy>,
    pub min_args_override: Option<usize>,
}

/// The classpath-and-main-class-and-optional-libraries layering mode, resolved once
/// before argument synthesis.
pub enum Overlay {
    None,
    /// A custom or modern-Forge descriptor layered on top of vanilla: its main class
    /// and libraries take precedence, its arguments replace vanilla's when present.
    Custom { descriptor: VersionDescriptor, classpath: Vec<PathBuf> },
    /// A legacy Forge universal JAR: prepended to the classpath, main class replaced,
    /// vanilla arguments untouched.
    ForgeLegacy { main_class: String, classpath_prefix: Vec<PathBuf> },
}

fn minor_version(id: &str) -> Option<u32> {
    id.split('.').nth(1)?.split(['-', ' ']).next()?.parse().ok()
}

/// Synthesize the full JVM command-line token list (flags, `-cp`, main class) plus the
/// game argument token list, substituting every recognized `${...}` placeholder.
pub fn synthesize(
    vanilla: &VersionDescriptor,
    overlay: &Overlay,
    vanilla_classpath: &[PathBuf],
    client_jar: &Path,
    os: Os,
    ctx: &ArgsContext,
) -> Result<(Vec<String>, String, Vec<String>), Error> {
    let sep = os.path_sep();

    let (main_class, classpath) = match overlay {
        Overlay::None => (vanilla.main_class.clone(), join_classpath(vanilla_classpath, client_jar, sep)),
        Overlay::Custom { descriptor, classpath } => {
            let mut entries: Vec<&Path> = classpath.iter().map(PathBuf::as_path).collect();
            entries.extend(vanilla_classpath.iter().map(PathBuf::as_path));
            entries.push(client_jar);
            (descriptor.main_class.clone(), join_paths(&entries, sep))
        }
        Overlay::ForgeLegacy { main_class, classpath_prefix } => {
            let mut entries: Vec<&Path> = classpath_prefix.iter().map(PathBuf::as_path).collect();
            entries.extend(vanilla_classpath.iter().map(PathBuf::as_path));
            entries.push(client_jar);
            (main_class.clone(), join_paths(&entries, sep))
        }
    };

    if main_class.is_empty() {
        return Err(Error::MissingMainClass);
    }

    let mut jvm_args = vec![
        "-XX:-UseAdaptiveSizePolicy".to_string(),
        "-XX:-OmitStackTraceInFastThrow".to_string(),
        "-Dfml.ignorePatchDiscrepancies=true".to_string(),
        "-Dfml.ignoreInvalidMinecraftCertificates=true".to_string(),
        format!("-Djava.library.path={}", ctx.natives_dir.display()),
        format!("-Xmx{}M", ctx.memory_max_mb),
        format!("-Xms{}M", ctx.memory_min_mb),
    ];

    let emit_osx_flag = os != Os::Osx || minor_version(&vanilla.id).is_some_and(|minor| minor > 12);
    if emit_osx_flag {
        jvm_args.push(os.jvm_extra_flag().to_string());
    }

    jvm_args.extend(ctx.custom_args.iter().cloned());
    jvm_args.push("-cp".to_string());
    jvm_args.push(classpath.clone());

    let features = HashMap::new();
    let descriptor_for_args = match overlay {
        Overlay::Custom { descriptor, .. } => descriptor,
        _ => vanilla,
    };

    let mut game_args = descriptor_for_args.game_arguments.resolve(os, &features);

    let threshold = ctx.min_args_override.unwrap_or(if vanilla.is_legacy_assets() { 5 } else { 11 });
    if game_args.len() < threshold {
        let vanilla_args = vanilla.game_arguments.resolve(os, &features);
        for token in vanilla_args {
            if !game_args.contains(&token) {
                game_args.push(token);
            }
        }
    }

    if let Some(window) = ctx.window {
        match window {
            Window::Fullscreen => game_args.push("--fullscreen".to_string()),
            Window::Sized { width, height } => {
                game_args.push("--width".to_string());
                game_args.push(width.to_string());
                game_args.push("--height".to_string());
                game_args.push(height.to_string());
            }
        }
    }

    if let Some(server) = &ctx.server {
        game_args.push("--server".to_string());
        game_args.push(server.host.clone());
        game_args.push("--port".to_string());
        game_args.push(server.port.to_string());
    }

    if let Some(proxy) = &ctx.proxy {
        game_args.push("--proxyHost".to_string());
        game_args.push(proxy.host.clone());
        game_args.push("--proxyPort".to_string());
        game_args.push(proxy.port.to_string());
        if let Some(username) = &proxy.username {
            game_args.push("--proxyUser".to_string());
            game_args.push(username.clone());
        }
        if let Some(password) = &proxy.password {
            game_args.push("--proxyPass".to_string());
            game_args.push(password.clone());
        }
    }

    game_args.extend(ctx.custom_launch_args.iter().cloned());

    let assets_root_for_substitution = if vanilla.is_legacy_assets() {
        ctx.root.join("assets").join("legacy")
    } else {
        ctx.assets_dir.clone()
    };

    let substitutions = build_substitutions(vanilla, ctx, &assets_root_for_substitution);
    substitute_all(&mut jvm_args, &substitutions);
    let mut game_args = game_args;
    substitute_all(&mut game_args, &substitutions);

    Ok((jvm_args, main_class, game_args))
}

fn join_classpath(libs: &[PathBuf], client_jar: &Path, sep: char) -> String {
    let mut entries: Vec<&Path> = libs.iter().map(PathBuf::as_path).collect();
    entries.push(client_jar);
    join_paths(&entries, sep)
}

fn join_paths(paths: &[&Path], sep: char) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(&sep.to_string())
}

fn build_substitutions(
    vanilla: &VersionDescriptor,
    ctx: &ArgsContext,
    assets_root: &Path,
) -> HashMap<&'static str, String> {
    let mut map = HashMap::new();
    map.insert("${auth_access_token}", ctx.authorization.access_token.clone());
    map.insert("${auth_session}", ctx.authorization.access_token.clone());
    map.insert("${auth_player_name}", ctx.authorization.name.clone());
    map.insert("${auth_uuid}", ctx.authorization.uuid.clone());
    map.insert("${user_properties}", ctx.authorization.user_properties.clone());
    map.insert("${user_type}", "mojang".to_string());
    map.insert("${version_name}", ctx.version_number.clone());
    map.insert("${version_type}", ctx.version_type.clone());
    map.insert(
        "${assets_index_name}",
        vanilla.asset_index.as_ref().map(|a| a.id.clone()).unwrap_or_default(),
    );
    map.insert("${game_directory}", ctx.root.display().to_string());
    map.insert("${assets_root}", assets_root.display().to_string());
    map.insert("${game_assets}", assets_root.display().to_string());
    map
}

fn substitute_all(tokens: &mut [String], substitutions: &HashMap<&'static str, String>) {
    for token in tokens {
        for (placeholder, value) in substitutions {
            if token == placeholder {
                *token = value.clone();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ArgsContext {
        ArgsContext {
            root: PathBuf::from("/tmp/mc"),
            version_number: "1.8.9".into(),
            version_type: "release".into(),
            authorization: Authorization {
                access_token: "T".into(),
                name: "Steve".into(),
                uuid: "U".into(),
                user_properties: "{}".into(),
            },
            memory_min_mb: 512,
            memory_max_mb: 2048,
            natives_dir: PathBuf::from("/tmp/mc/natives/1.8.9"),
            assets_dir: PathBuf::from("/tmp/mc/assets"),
            custom_args: Vec::new(),
            custom_launch_args: Vec::new(),
            window: None,
            server: None,
            proxy: None,
            min_args_override: None,
        }
    }

    fn descriptor() -> VersionDescriptor {
        VersionDescriptor {
            id: "1.8.9".into(),
            main_class: "net.minecraft.client.main.Main".into(),
            assets: Some("legacy".into()),
            asset_index: None,
            downloads: None,
            libraries: Vec::new(),
            game_arguments: crate::version::GameArguments::Legacy(
                "--username ${auth_player_name} --accessToken ${auth_access_token}".into(),
            ),
            jvm_arguments: crate::version::JvmArguments(Vec::new()),
        }
    }

    #[test]
    fn synthesize_substitutes_all_placeholders() {
        let descriptor = descriptor();
        let client_jar = PathBuf::from("/tmp/mc/versions/1.8.9/1.8.9.jar");
        let (jvm_args, main_class, game_args) =
            synthesize(&descriptor, &Overlay::None, &[], &client_jar, Os::Linux, &ctx()).unwrap();

        assert_eq!(main_class, "net.minecraft.client.main.Main");
        assert!(jvm_args.iter().any(|a| a.starts_with("-Xmx2048M")));
        assert!(jvm_args.iter().any(|a| a == "-cp"));
        for token in jvm_args.iter().chain(game_args.iter()) {
            assert!(!is_unsubstituted_placeholder(token), "leftover placeholder: {token}");
        }
        assert!(game_args.contains(&"Steve".to_string()));
        assert!(game_args.contains(&"T".to_string()));
    }

    fn is_unsubstituted_placeholder(token: &str) -> bool {
        token.starts_with("${") && token.ends_with('}')
    }

    #[test]
    fn classpath_uses_platform_separator() {
        let descriptor = descriptor();
        let client_jar = PathBuf::from("/tmp/mc/versions/1.8.9/1.8.9.jar");
        let libs = vec![PathBuf::from("/tmp/mc/libraries/a.jar")];
        let (jvm_args, _, _) = synthesize(&descriptor, &Overlay::None, &libs, &client_jar, Os::Windows, &ctx()).unwrap();
        let cp_index = jvm_args.iter().position(|a| a == "-cp").unwrap();
        let cp = &jvm_args[cp_index + 1];
        assert!(cp.contains(';'));
        assert!(!cp.contains(':'));
    }
}
