//! Top-level orchestration: ties the resolver, materializers, overlay and argument
//! synthesizer together into one pipeline and spawns the game process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::args::{ArgsContext, Authorization, Overlay, Proxy, ServerJoin, Window};
use crate::error::Error;
use crate::event::Handler;
use crate::os::Os;

/// Default Mojang/resource endpoints, overridable per [`LaunchOptions`].
pub const DEFAULT_META_URL: &str = "https://launchermeta.mojang.com";
pub const DEFAULT_RESOURCE_URL: &str = "https://resources.download.minecraft.net";

/// Builder-constructed, immutable configuration for one launch.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    root: PathBuf,
    version_number: String,
    version_type: String,
    version_custom: Option<String>,
    memory_min_mb: u32,
    memory_max_mb: u32,
    java_path: Option<PathBuf>,
    forge: Option<PathBuf>,
    forge_wrapper_jar: Option<PathBuf>,
    forge_wrapper_version: String,
    forge_maven_mirror: Option<String>,
    installer: Option<PathBuf>,
    client_package: Option<String>,
    remove_package: bool,
    authorization: Authorization,
    window: Option<Window>,
    server: Option<ServerJoin>,
    proxy: Option<Proxy>,
    custom_args: Vec<String>,
    custom_launch_args: Vec<String>,
    max_sockets: usize,
    min_args: Option<usize>,
    detached: bool,
    cwd: Option<PathBuf>,
    meta_url: String,
    resource_url: String,
}

impl LaunchOptions {
    pub fn new(root: impl Into<PathBuf>, version_number: impl Into<String>, authorization: Authorization) -> Self {
        Self {
            root: root.into(),
            version_number: version_number.into(),
            version_type: "release".to_string(),
            version_custom: None,
            memory_min_mb: 512,
            memory_max_mb: 2048,
            java_path: None,
            forge: None,
            forge_wrapper_jar: None,
            forge_wrapper_version: "mmc2".to_string(),
            forge_maven_mirror: None,
            installer: None,
            client_package: None,
            remove_package: false,
            authorization,
            window: None,
            server: None,
            proxy: None,
            custom_args: Vec::new(),
            custom_launch_args: Vec::new(),
            max_sockets: 2,
            min_args: None,
            detached: false,
            cwd: None,
            meta_url: DEFAULT_META_URL.to_string(),
            resource_url: DEFAULT_RESOURCE_URL.to_string(),
        }
    }

    pub fn version_type(&mut self, version_type: impl Into<String>) -> &mut Self {
        self.version_type = version_type.into();
        self
    }

    pub fn version_custom(&mut self, id: impl Into<String>) -> &mut Self {
        self.version_custom = Some(id.into());
        self
    }

    pub fn memory(&mut self, min_mb: u32, max_mb: u32) -> &mut Self {
        self.memory_min_mb = min_mb;
        self.memory_max_mb = max_mb;
        self
    }

    pub fn java_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.java_path = Some(path.into());
        self
    }

    pub fn forge(&mut self, path: impl Into<PathBuf>, wrapper_jar: impl Into<PathBuf>) -> &mut Self {
        self.forge = Some(path.into());
        self.forge_wrapper_jar = Some(wrapper_jar.into());
        self
    }

    /// Override the ForgeWrapper release used to derive its library save path
    /// (`io/github/zekerzhayard/ForgeWrapper/<version>`). Defaults to `"mmc2"`.
    pub fn forge_wrapper_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.forge_wrapper_version = version.into();
        self
    }

    /// Configure the first Forge library mirror tried during a legacy overlay, ahead of
    /// the default Forge Maven and the fallback search endpoints.
    pub fn forge_maven_mirror(&mut self, url: impl Into<String>) -> &mut Self {
        self.forge_maven_mirror = Some(url.into());
        self
    }

    pub fn installer(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.installer = Some(path.into());
        self
    }

    pub fn client_package(&mut self, url_or_path: impl Into<String>, remove_after: bool) -> &mut Self {
        self.client_package = Some(url_or_path.into());
        self.remove_package = remove_after;
        self
    }

    pub fn window_fullscreen(&mut self) -> &mut Self {
        self.window = Some(Window::Fullscreen);
        self
    }

    pub fn window_size(&mut self, width: u32, height: u32) -> &mut Self {
        self.window = Some(Window::Sized { width, height });
        self
    }

    pub fn server(&mut self, host: impl Into<String>, port: u16) -> &mut Self {
        self.server = Some(ServerJoin { host: host.into(), port });
        self
    }

    pub fn proxy(&mut self, proxy: Proxy) -> &mut Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn custom_args(&mut self, args: impl IntoIterator<Item = String>) -> &mut Self {
        self.custom_args.extend(args);
        self
    }

    pub fn custom_launch_args(&mut self, args: impl IntoIterator<Item = String>) -> &mut Self {
        self.custom_launch_args.extend(args);
        self
    }

    pub fn max_sockets(&mut self, count: usize) -> &mut Self {
        self.max_sockets = count.max(1);
        self
    }

    pub fn min_args(&mut self, count: usize) -> &mut Self {
        self.min_args = Some(count);
        self
    }

    pub fn detached(&mut self, detached: bool) -> &mut Self {
        self.detached = detached;
        self
    }

    pub fn cwd(&mut self, cwd: impl Into<PathBuf>) -> &mut Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn endpoints(&mut self, meta_url: impl Into<String>, resource_url: impl Into<String>) -> &mut Self {
        self.meta_url = meta_url.into();
        self.resource_url = resource_url.into();
        self
    }
}

/// The spawned game process, with its stdout/stderr relayed through the handler before
/// this struct is produced (see [`Launcher::launch`]).
pub struct Game {
    pub exit_code: Option<i32>,
}

/// Orchestrates version resolution, materialization, overlay, argument synthesis and
/// process spawn for one [`LaunchOptions`].
pub struct Launcher {
    options: LaunchOptions,
}

impl Launcher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    /// Run the full pipeline synchronously, spawning an internal single-threaded Tokio
    /// runtime for the duration of the call (mirroring the crate's sync-over-async
    /// public API convention).
    pub fn launch(&self, mut handler: impl Handler) -> Result<Game, Error> {
        crate::rt::block_on(self.launch_async(&mut handler))
    }

    async fn launch_async(&self, handler: &mut impl Handler) -> Result<Game, Error> {
        let opts = &self.options;
        let os = Os::current();

        handler.debug(&format!("[MCLC]: preparing launch of {}", opts.version_number));

        let java_path = probe_java(opts.java_path.as_deref()).await?;

        tokio::fs::create_dir_all(&opts.root).await.map_err(|e| Error::new_io(&opts.root, e))?;

        if let Some(package) = &opts.client_package {
            extract_client_package(package, &opts.root, opts.remove_package).await?;
            handler.package_extract();
        }

        if let Some(installer) = &opts.installer {
            ensure_launcher_profiles(&opts.root).await?;
            run_installer(installer, &opts.root).await?;
        }

        let (vanilla, vanilla_bytes) =
            crate::version::resolve(&opts.root, &opts.meta_url, &opts.version_number, None)
                .await
                .map_err(Error::Version)?;

        let version_dir = opts.root.join("versions").join(&vanilla.id);
        let client_jar = version_dir.join(format!("{}.jar", vanilla.id));
        let library_root = opts.root.join("libraries");
        let natives_dir = opts.root.join("natives").join(&vanilla.id);
        let assets_root = opts.root.join("assets");

        crate::natives::materialize(&vanilla.libraries, &natives_dir, os, opts.max_sockets, handler)
            .await
            .map_err(Error::Natives)?;

        if tokio::fs::metadata(&client_jar).await.is_err() {
            if let Some(downloads) = &vanilla.downloads {
                let sha1 = crate::serde_util::parse_hex_bytes::<20>(&downloads.client.sha1);
                let mut entry = crate::download::Entry::new(downloads.client.url.clone(), client_jar.clone())
                    .with_size(downloads.client.size);
                if let Some(sha1) = sha1 {
                    entry = entry.with_sha1(sha1);
                }
                let mut batch = crate::download::Batch::new();
                batch.push(entry);
                let results = batch
                    .download_async(opts.max_sockets, crate::event::ProgressKind::Libraries, handler)
                    .await
                    .map_err(crate::download::Error::from)?;
                for result in results {
                    result?;
                }
            }
        }

        // Only written here, once the client jar this descriptor describes has actually
        // landed on disk (or was already present) — never eagerly in `version::resolve`.
        crate::version::persist(&opts.root, &vanilla.id, &vanilla_bytes).await.map_err(Error::Version)?;

        let vanilla_classpath =
            crate::library::materialize(&vanilla.libraries, &library_root, os, opts.max_sockets, handler)
                .await
                .map_err(Error::Library)?;

        let overlay = self.resolve_overlay(&vanilla, &library_root, &java_path, os, handler).await?;

        let asset_index = vanilla.asset_index.clone();
        if let Some(asset_index) = &asset_index {
            crate::assets::materialize(
                &assets_root,
                &opts.resource_url,
                asset_index,
                vanilla.is_legacy_assets(),
                opts.max_sockets,
                handler,
            )
            .await
            .map_err(Error::Assets)?;
        }

        let ctx = ArgsContext {
            root: opts.root.clone(),
            version_number: opts.version_number.clone(),
            version_type: opts.version_type.clone(),
            authorization: opts.authorization.clone(),
            memory_min_mb: opts.memory_min_mb,
            memory_max_mb: opts.memory_max_mb,
            natives_dir: natives_dir.clone(),
            assets_dir: assets_root.clone(),
            custom_args: opts.custom_args.clone(),
            custom_launch_args: opts.custom_launch_args.clone(),
            window: opts.window,
            server: opts.server.clone(),
            proxy: opts.proxy.clone(),
            min_args_override: opts.min_args,
        };

        let (jvm_args, main_class, game_args) =
            crate::args::synthesize(&vanilla, &overlay, &vanilla_classpath, &client_jar, os, &ctx)
                .map_err(Error::Args)?;

        let mut all_args = jvm_args.clone();
        all_args.push(main_class);
        all_args.extend(game_args);
        handler.arguments(&all_args);

        let cwd = opts.cwd.clone().unwrap_or_else(|| opts.root.clone());
        let mut command = tokio::process::Command::new(&java_path);
        command.args(&all_args).current_dir(&cwd).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command.spawn().map_err(Error::Spawn)?;
        relay_child_output(&mut child, handler).await;
        let status = child.wait().await.map_err(Error::Spawn)?;
        let exit_code = status.code();
        handler.close(exit_code);

        Ok(Game { exit_code })
    }

    async fn resolve_overlay(
        &self,
        vanilla: &crate::version::VersionDescriptor,
        library_root: &Path,
        java_path: &Path,
        os: Os,
        handler: &mut impl Handler,
    ) -> Result<Overlay, Error> {
        let opts = &self.options;

        if let Some(forge_path) = &opts.forge {
            let forge_dir = opts.root.join("forge").join(&vanilla.id);
            match crate::forge::detect_mode(forge_path).map_err(Error::Forge)? {
                crate::forge::ForgeMode::Legacy => {
                    let overlay = crate::forge::materialize_legacy(
                        forge_path,
                        &forge_dir,
                        library_root,
                        os,
                        opts.max_sockets,
                        opts.forge_maven_mirror.as_deref(),
                        handler,
                    )
                    .await
                    .map_err(Error::Forge)?;
                    return Ok(Overlay::ForgeLegacy {
                        main_class: overlay.main_class,
                        classpath_prefix: overlay.classpath_prefix,
                    });
                }
                crate::forge::ForgeMode::Modern => {
                    let wrapper_jar = opts
                        .forge_wrapper_jar
                        .clone()
                        .expect("modern forge overlay requires a bundled ForgeWrapper jar path");
                    let descriptor = crate::forge::materialize_modern(
                        forge_path,
                        &opts.root,
                        &forge_dir,
                        library_root,
                        java_path,
                        &wrapper_jar,
                        &opts.forge_wrapper_version,
                        handler,
                    )
                    .await
                    .map_err(Error::Forge)?;
                    let classpath =
                        crate::library::materialize(&descriptor.libraries, library_root, os, opts.max_sockets, handler)
                            .await
                            .map_err(Error::Library)?;
                    return Ok(Overlay::Custom { descriptor, classpath });
                }
            }
        }

        if let Some(custom_id) = &opts.version_custom {
            let (descriptor, descriptor_bytes) =
                crate::version::resolve(&opts.root, &opts.meta_url, custom_id, None)
                    .await
                    .map_err(Error::Version)?;
            // A custom overlay has no client jar of its own to wait on, so its
            // descriptor is persisted as soon as it resolves.
            crate::version::persist(&opts.root, custom_id, &descriptor_bytes).await.map_err(Error::Version)?;
            let classpath =
                crate::library::materialize(&descriptor.libraries, library_root, os, opts.max_sockets, handler)
                    .await
                    .map_err(Error::Library)?;
            return Ok(Overlay::Custom { descriptor, classpath });
        }

        Ok(Overlay::None)
    }
}

async fn probe_java(configured: Option<&Path>) -> Result<PathBuf, Error> {
    let candidate = configured.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("java"));
    let output = tokio::process::Command::new(&candidate).arg("-version").output().await;
    match output {
        Ok(output) if output.status.success() || !output.stderr.is_empty() => Ok(candidate),
        Ok(_) => Err(Error::JavaUnavailable(candidate.display().to_string())),
        Err(e) => Err(Error::JavaUnavailable(format!("{}: {e}", candidate.display()))),
    }
}

async fn ensure_launcher_profiles(root: &Path) -> Result<(), Error> {
    let path = root.join("launcher_profiles.json");
    if tokio::fs::metadata(&path).await.is_err() {
        tokio::fs::write(&path, b"{}").await.map_err(|e| Error::new_io(&path, e))?;
    }
    Ok(())
}

async fn run_installer(installer: &Path, root: &Path) -> Result<(), Error> {
    let status = tokio::process::Command::new(installer)
        .current_dir(root)
        .status()
        .await
        .map_err(Error::Spawn)?;
    if !status.success() {
        return Err(Error::InstallerFailed { path: installer.to_path_buf(), status: status.code() });
    }
    Ok(())
}

async fn extract_client_package(source: &str, root: &Path, remove_after: bool) -> Result<(), Error> {
    let local_path = if source.starts_with("http://") || source.starts_with("https://") {
        let dest = root.join(".client-package.zip");
        crate::download::fetch_optional(source, &dest)
            .await
            .map_err(Error::Download)?;
        dest
    } else {
        PathBuf::from(source)
    };

    crate::archive::extract(&local_path, root).map_err(|e| Error::new_io(&local_path, io_error_from_archive(e)))?;

    if remove_after {
        let _ = tokio::fs::remove_file(&local_path).await;
    }

    Ok(())
}

fn io_error_from_archive(e: crate::archive::Error) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Authorization;

    fn auth() -> Authorization {
        Authorization {
            access_token: "token".into(),
            name: "Steve".into(),
            uuid: "uuid".into(),
            user_properties: "{}".into(),
        }
    }

    #[test]
    fn builder_applies_memory_and_window() {
        let mut options = LaunchOptions::new("/tmp/mc", "1.20.1", auth());
        options.memory(1024, 4096).window_size(1280, 720).max_sockets(0);
        assert_eq!(options.memory_min_mb, 1024);
        assert_eq!(options.memory_max_mb, 4096);
        assert!(matches!(options.window, Some(Window::Sized { width: 1280, height: 720 })));
        // max_sockets is clamped to at least 1, never zero.
        assert_eq!(options.max_sockets, 1);
    }

    #[tokio::test]
    async fn ensure_launcher_profiles_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        ensure_launcher_profiles(dir.path()).await.unwrap();
        let first = tokio::fs::read(dir.path().join("launcher_profiles.json")).await.unwrap();
        ensure_launcher_profiles(dir.path()).await.unwrap();
        let second = tokio::fs::read(dir.path().join("launcher_profiles.json")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, b"{}");
    }
}

async fn relay_child_output(child: &mut tokio::process::Child, handler: &mut impl Handler) {
    use tokio::io::{AsyncBufReadExt, BufReader};

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            handler.data(&line);
        }
    }
    if let Some(stderr) = child.stderr.take() {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            handler.data(&line);
        }
    }
}
