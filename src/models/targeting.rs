use crate::models::common::Vector3;
use crate::models::scene::{EntityHandle, Scene};

/// 交戦距離（この距離未満の候補のみ目標にする）
pub const ENGAGEMENT_RANGE: f64 = 25.0;

/// 目標選定
///
/// 候補を先頭から走査して最も近いものを求め、その距離が交戦距離未満であれば
/// 目標として返します。同距離の候補は先に現れたものが優先されます。
///
/// # 引数
///
/// * `position` - 選定する側の位置
/// * `candidates` - 候補のハンドルと位置の列
///
/// # 戻り値
///
/// 選ばれた候補のハンドル。候補が空、または全候補が交戦距離外なら `None`
pub fn select_target<I>(position: Vector3, candidates: I) -> Option<EntityHandle>
where
    I: IntoIterator<Item = (EntityHandle, Vector3)>,
{
    let mut closest: Option<(EntityHandle, f64)> = None;

    for (handle, candidate_position) in candidates {
        let distance = position.distance(&candidate_position);
        match closest {
            Some((_, best)) if !(distance < best) => {}
            _ => closest = Some((handle, distance)),
        }
    }

    closest
        .filter(|(_, distance)| *distance < ENGAGEMENT_RANGE)
        .map(|(handle, _)| handle)
}

/// ターゲットリストをシーン経由で解決して目標を選定
///
/// 消滅済みのエンティティは候補から除外されます。
pub fn select_from_scene(position: Vector3, target_list: &[EntityHandle], scene: &Scene) -> Option<EntityHandle> {
    select_target(
        position,
        target_list
            .iter()
            .filter_map(|&handle| scene.position(handle).map(|p| (handle, p))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scene::Transform;

    fn candidates_at(distances: &[f64]) -> Vec<(EntityHandle, Vector3)> {
        distances
            .iter()
            .enumerate()
            .map(|(i, &d)| (EntityHandle(i), Vector3::new(0.0, 0.0, d)))
            .collect()
    }

    #[test]
    fn test_empty_list_selects_none() {
        assert_eq!(select_target(Vector3::ZERO, Vec::new()), None);
    }

    #[test]
    fn test_nearest_within_range_is_selected() {
        assert_eq!(select_target(Vector3::ZERO, candidates_at(&[20.0, 10.0, 40.0])), Some(EntityHandle(1)));
        assert_eq!(select_target(Vector3::ZERO, candidates_at(&[30.0, 10.0, 40.0])), Some(EntityHandle(1)));
    }

    #[test]
    fn test_all_out_of_range_selects_none() {
        assert_eq!(select_target(Vector3::ZERO, candidates_at(&[30.0, 30.0, 40.0])), None);
        // 境界値は交戦距離外
        assert_eq!(select_target(Vector3::ZERO, candidates_at(&[25.0])), None);
    }

    #[test]
    fn test_tie_keeps_first_encountered() {
        let candidates = vec![
            (EntityHandle(7), Vector3::new(10.0, 0.0, 0.0)),
            (EntityHandle(3), Vector3::new(-10.0, 0.0, 0.0)),
            (EntityHandle(5), Vector3::new(0.0, 0.0, 10.0)),
        ];
        assert_eq!(select_target(Vector3::ZERO, candidates), Some(EntityHandle(7)));
    }

    #[test]
    fn test_select_from_scene_skips_despawned() {
        let mut scene = Scene::new();
        let near = scene.spawn("near", Transform::new(Vector3::new(0.0, 0.0, 5.0), Vector3::FORWARD));
        let mid = scene.spawn("mid", Transform::new(Vector3::new(0.0, 0.0, 15.0), Vector3::FORWARD));
        let list = vec![near, mid];

        assert_eq!(select_from_scene(Vector3::ZERO, &list, &scene), Some(near));
        scene.despawn(near);
        assert_eq!(select_from_scene(Vector3::ZERO, &list, &scene), Some(mid));
        scene.despawn(mid);
        assert_eq!(select_from_scene(Vector3::ZERO, &list, &scene), None);
    }
}
