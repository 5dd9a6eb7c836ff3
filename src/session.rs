// session.rs — 当前星球/贴图/输出投影，以及 (源投影, 输出投影) 组合缓存
//
// 不变式：当前选中的贴图总是已加载，且当前 (源, 输出) 组合总在缓存里。
// 所有选择操作都是先把资源准备好再提交，失败时回到上一个成功的状态。

use crate::error::ViewerError;
use crate::images::{self, PreparedImage};
use crate::maps::{self, Crop, LoadedTexture, MapPack, SphereMap};
use crate::projection::Projection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 渲染后端：解码、上传纹理、组合 shader。
pub trait Backend {
    type Texture;
    type Composition;

    fn load_image(&mut self, path: &Path, crop: Option<Crop>) -> Result<PreparedImage, ViewerError> {
        images::prepare(images::decode(path)?, crop)
    }

    fn upload_texture(&mut self, image: PreparedImage) -> Result<Self::Texture, ViewerError>;

    fn build_composition(
        &mut self,
        source: Projection,
        output: Projection,
    ) -> Result<Self::Composition, ViewerError>;
}

/// 当前帧需要的全部东西
pub struct Active<'a, B: Backend> {
    pub pack: &'a MapPack<B::Texture>,
    pub map: &'a SphereMap<B::Texture>,
    pub texture: &'a LoadedTexture<B::Texture>,
    pub composition: &'a B::Composition,
    pub source: Projection,
    pub output: Projection,
}

pub struct Session<B: Backend> {
    packs: Vec<MapPack<B::Texture>>,
    current_pack: usize,
    output: Projection,
    image_dir: PathBuf,
    // 投影第一次出现时分配的小整数 id
    ids: HashMap<Projection, u8>,
    compositions: HashMap<(u8, u8), B::Composition>,
    last_good: (usize, usize),
}

impl<B: Backend> Session<B> {
    /// 加载第 0 个星球的第 0 张图并组合初始 shader。这里失败不可恢复。
    pub fn start(
        backend: &mut B,
        image_dir: impl Into<PathBuf>,
        output: Projection,
    ) -> Result<Self, ViewerError> {
        let mut session = Self {
            packs: maps::catalog(),
            current_pack: 0,
            output,
            image_dir: image_dir.into(),
            ids: HashMap::new(),
            compositions: HashMap::new(),
            last_good: (0, 0),
        };
        session.try_select(backend, 0, 0)?;
        Ok(session)
    }

    pub fn packs(&self) -> &[MapPack<B::Texture>] {
        &self.packs
    }

    pub fn current_pack(&self) -> usize {
        self.current_pack
    }

    pub fn current_map(&self) -> usize {
        self.packs[self.current_pack].current
    }

    pub fn output(&self) -> Projection {
        self.output
    }

    pub fn source(&self) -> Projection {
        self.packs[self.current_pack].current_map().entry.source
    }

    pub fn composition_count(&self) -> usize {
        self.compositions.len()
    }

    fn projection_id(&mut self, p: Projection) -> u8 {
        let next = self.ids.len() as u8;
        *self.ids.entry(p).or_insert(next)
    }

    fn composition_key(&self, source: Projection, output: Projection) -> Option<(u8, u8)> {
        Some((*self.ids.get(&source)?, *self.ids.get(&output)?))
    }

    fn ensure_composition(
        &mut self,
        backend: &mut B,
        source: Projection,
        output: Projection,
    ) -> Result<(), ViewerError> {
        let key = (self.projection_id(source), self.projection_id(output));
        if self.compositions.contains_key(&key) {
            return Ok(());
        }
        let composition = backend.build_composition(source, output)?;
        log::info!("built composition {source} -> {output}");
        self.compositions.insert(key, composition);
        Ok(())
    }

    fn ensure_loaded(&mut self, backend: &mut B, pack: usize, index: usize) -> Result<(), ViewerError> {
        let map = &self.packs[pack].maps[index];
        if map.texture.is_some() {
            return Ok(());
        }
        let path = self.image_dir.join(map.entry.file);
        let prepared = backend.load_image(&path, map.entry.crop)?;
        let (sx, sy) = (prepared.sx, prepared.sy);
        let handle = backend.upload_texture(prepared)?;
        self.packs[pack].maps[index].texture = Some(LoadedTexture { handle, sx, sy });
        Ok(())
    }

    /// 资源全部就绪才切换过去
    fn try_select(&mut self, backend: &mut B, pack: usize, index: usize) -> Result<(), ViewerError> {
        let maps = &self.packs.get(pack).ok_or(ViewerError::NoSuchPack(pack))?.maps;
        let source = maps
            .get(index)
            .ok_or(ViewerError::NoSuchMap { pack, index })?
            .entry
            .source;
        self.ensure_loaded(backend, pack, index)?;
        self.ensure_composition(backend, source, self.output)?;

        self.current_pack = pack;
        self.packs[pack].current = index;
        self.last_good = (pack, index);
        Ok(())
    }

    /// 选中指定星球的指定贴图，失败时回到上一个成功的选择
    pub fn select_entry(&mut self, backend: &mut B, pack: usize, index: usize) -> Result<(), ViewerError> {
        self.try_select(backend, pack, index).map_err(|e| {
            let (pack, index) = self.last_good;
            self.current_pack = pack;
            self.packs[pack].current = index;
            log::warn!("selection failed, staying on {}", self.packs[pack].maps[index].entry.file);
            e
        })
    }

    /// 在当前星球内选图
    pub fn select_map(&mut self, backend: &mut B, index: usize) -> Result<(), ViewerError> {
        self.select_entry(backend, self.current_pack, index)
    }

    /// 切换星球，沿用该星球上次选中的图
    pub fn select_pack(&mut self, backend: &mut B, pack: usize) -> Result<(), ViewerError> {
        let index = self
            .packs
            .get(pack)
            .ok_or(ViewerError::NoSuchPack(pack))?
            .current;
        self.select_entry(backend, pack, index)
    }

    /// 切换输出投影，失败时保留原投影
    pub fn set_projection(&mut self, backend: &mut B, output: Projection) -> Result<(), ViewerError> {
        if output == self.output {
            return Ok(());
        }
        let source = self.source();
        match self.ensure_composition(backend, source, output) {
            Ok(()) => {
                self.output = output;
                Ok(())
            }
            Err(e) => {
                log::warn!("cannot switch to {output}, staying on {}", self.output);
                Err(e)
            }
        }
    }

    pub fn active(&self) -> Option<Active<'_, B>> {
        let pack = &self.packs[self.current_pack];
        let map = pack.current_map();
        let source = map.entry.source;
        let key = self.composition_key(source, self.output)?;
        Some(Active {
            pack,
            map,
            texture: map.texture.as_ref()?,
            composition: self.compositions.get(&key)?,
            source,
            output: self.output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableError;
    use image::RgbaImage;
    use std::collections::HashSet;

    #[derive(Default)]
    struct MockBackend {
        broken_outputs: HashSet<Projection>,
        broken_sources: HashSet<Projection>,
        broken_tables: HashSet<Projection>,
        missing_files: HashSet<&'static str>,
        loads: Vec<PathBuf>,
        built: Vec<(Projection, Projection)>,
    }

    impl Backend for MockBackend {
        type Texture = usize;
        type Composition = (Projection, Projection);

        fn load_image(&mut self, path: &Path, crop: Option<Crop>) -> Result<PreparedImage, ViewerError> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if self.missing_files.contains(name) {
                return Err(ViewerError::Decode {
                    path: path.to_path_buf(),
                    source: image::ImageError::IoError(std::io::ErrorKind::NotFound.into()),
                });
            }
            self.loads.push(path.to_path_buf());
            images::prepare(RgbaImage::new(1600, 800), crop)
        }

        fn upload_texture(&mut self, _image: PreparedImage) -> Result<usize, ViewerError> {
            Ok(self.loads.len())
        }

        fn build_composition(
            &mut self,
            source: Projection,
            output: Projection,
        ) -> Result<(Projection, Projection), ViewerError> {
            if let Some(p) = [source, output].into_iter().find(|p| self.broken_tables.contains(p)) {
                return Err(ViewerError::Tables {
                    projection: p.shader(),
                    source: TableError::Unfilled {
                        table: p.shader(),
                        slot: 0,
                    },
                });
            }
            if self.broken_outputs.contains(&output) || self.broken_sources.contains(&source) {
                return Err(ViewerError::Shader {
                    name: format!("{}_{}", source.shader(), output.shader()),
                    log: "error: mock compile failure".into(),
                });
            }
            self.built.push((source, output));
            Ok((source, output))
        }
    }

    fn active_pair(session: &Session<MockBackend>) -> (Projection, Projection) {
        *session.active().expect("active composition").composition
    }

    #[test]
    fn failed_projection_switch_keeps_previous_output() {
        let mut backend = MockBackend::default();
        backend.broken_outputs.insert(Projection::Azimuthal);
        let mut session = Session::start(&mut backend, "res/images", Projection::Equirectangular).unwrap();

        session.select_pack(&mut backend, 0).unwrap();
        session.select_map(&mut backend, 2).unwrap();
        session.set_projection(&mut backend, Projection::Hammer).unwrap();
        assert!(session.set_projection(&mut backend, Projection::Azimuthal).is_err());

        assert_eq!(session.output(), Projection::Hammer);
        assert_eq!(session.current_map(), 2);
        assert_eq!(active_pair(&session), (Projection::Equirectangular, Projection::Hammer));
    }

    #[test]
    fn broken_lookup_tables_disable_only_that_projection() {
        let mut backend = MockBackend::default();
        backend.broken_tables.insert(Projection::Robinson);
        let mut session = Session::start(&mut backend, "res/images", Projection::Hammer).unwrap();

        assert!(matches!(
            session.set_projection(&mut backend, Projection::Robinson),
            Err(ViewerError::Tables { projection: "robinson", .. })
        ));
        assert_eq!(session.output(), Projection::Hammer);

        // earth8 以 Robinson 保存，作为源同样不可用
        session.select_map(&mut backend, 3).unwrap();
        assert!(matches!(
            session.select_map(&mut backend, 7),
            Err(ViewerError::Tables { .. })
        ));
        assert_eq!(session.current_map(), 3);
        assert_eq!(active_pair(&session), (Projection::Equirectangular, Projection::Hammer));

        session.set_projection(&mut backend, Projection::Mollweide).unwrap();
        assert_eq!(session.output(), Projection::Mollweide);
    }

    #[test]
    fn compositions_are_built_once_per_pair() {
        let mut backend = MockBackend::default();
        let mut session = Session::start(&mut backend, "res/images", Projection::Hammer).unwrap();
        for _ in 0..3 {
            session.set_projection(&mut backend, Projection::Robinson).unwrap();
            session.set_projection(&mut backend, Projection::Hammer).unwrap();
        }
        assert_eq!(backend.built.len(), 2);
        assert_eq!(session.composition_count(), 2);
    }

    #[test]
    fn images_load_lazily_and_only_once() {
        let mut backend = MockBackend::default();
        let mut session = Session::start(&mut backend, "res/images", Projection::Hammer).unwrap();
        assert_eq!(backend.loads, [PathBuf::from("res/images/earth1.jpg")]);
        session.select_map(&mut backend, 1).unwrap();
        session.select_map(&mut backend, 0).unwrap();
        session.select_map(&mut backend, 1).unwrap();
        assert_eq!(backend.loads.len(), 2);
    }

    #[test]
    fn cropped_map_carries_sub_rectangle_scale() {
        let mut backend = MockBackend::default();
        let mut session = Session::start(&mut backend, "res/images", Projection::Hammer).unwrap();
        session.select_map(&mut backend, 6).unwrap();
        let active = session.active().unwrap();
        assert_eq!(active.map.entry.file, "earth7.jpg");
        assert_eq!(active.texture.sx, 1579.0 / 2048.0);
        assert_eq!(active.texture.sy, 787.0 / 1024.0);
        assert_eq!(active.source, Projection::Mollweide);
    }

    #[test]
    fn out_of_range_selection_changes_nothing() {
        let mut backend = MockBackend::default();
        let mut session = Session::start(&mut backend, "res/images", Projection::Hammer).unwrap();
        session.select_pack(&mut backend, 2).unwrap();
        assert!(matches!(
            session.select_map(&mut backend, 8),
            Err(ViewerError::NoSuchMap { pack: 2, index: 8 })
        ));
        assert!(matches!(session.select_pack(&mut backend, 6), Err(ViewerError::NoSuchPack(6))));
        assert_eq!((session.current_pack(), session.current_map()), (2, 0));
        assert!(session.active().is_some());
    }

    #[test]
    fn failed_composition_rolls_back_to_last_good_map() {
        let mut backend = MockBackend::default();
        backend.broken_sources.insert(Projection::Mollweide);
        let mut session = Session::start(&mut backend, "res/images", Projection::Hammer).unwrap();
        session.select_map(&mut backend, 3).unwrap();
        assert!(session.select_map(&mut backend, 5).is_err());
        assert_eq!(session.current_map(), 3);
        assert!(session.select_pack(&mut backend, 5).is_err());
        assert_eq!(session.current_pack(), 0);
        assert_eq!(active_pair(&session), (Projection::Equirectangular, Projection::Hammer));
    }

    #[test]
    fn unreadable_image_rolls_back() {
        let mut backend = MockBackend::default();
        backend.missing_files.insert("moon1.jpg");
        let mut session = Session::start(&mut backend, "res/images", Projection::Hammer).unwrap();
        assert!(matches!(
            session.select_pack(&mut backend, 1),
            Err(ViewerError::Decode { .. })
        ));
        assert_eq!(session.current_pack(), 0);
        assert!(session.packs()[1].maps[0].texture.is_none());
    }

    #[test]
    fn pack_remembers_its_map() {
        let mut backend = MockBackend::default();
        let mut session = Session::start(&mut backend, "res/images", Projection::Hammer).unwrap();
        session.select_pack(&mut backend, 2).unwrap();
        session.select_map(&mut backend, 1).unwrap();
        session.select_pack(&mut backend, 0).unwrap();
        session.select_pack(&mut backend, 2).unwrap();
        assert_eq!(session.current_map(), 1);
    }

    #[test]
    fn start_fails_when_initial_composition_fails() {
        let mut backend = MockBackend::default();
        backend.broken_outputs.insert(Projection::Azimuthal);
        assert!(Session::start(&mut backend, "res/images", Projection::Azimuthal).is_err());
    }
}
