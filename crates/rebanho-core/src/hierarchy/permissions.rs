//! Who may do what on which node of the tree.
//!
//! `Leadership` is a read snapshot of supervisors, group leaders and parent
//! links. `Leadership::permits` is a pure function of the snapshot, the
//! actor, the node and the action.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{AreaId, GroupId, MemberId, NodeRef, SectorId};
use crate::store::HierarchyRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Edit,
    ManageParticipants,
}

/// The user asking. `member_id` is `None` for accounts with no member record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub member_id: Option<MemberId>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Actor {
    pub fn admin() -> Self {
        Self {
            member_id: None,
            is_admin: true,
        }
    }

    pub fn member(member_id: MemberId) -> Self {
        Self {
            member_id: Some(member_id),
            is_admin: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupLeaders {
    sector_id: SectorId,
    facilitator: MemberId,
    host: MemberId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leadership {
    areas: BTreeMap<AreaId, BTreeSet<MemberId>>,
    sectors: BTreeMap<SectorId, (AreaId, BTreeSet<MemberId>)>,
    groups: BTreeMap<GroupId, GroupLeaders>,
}

impl Leadership {
    pub fn load<R: HierarchyRepository>(repo: &R) -> Result<Self> {
        let areas = repo
            .list_areas()?
            .into_iter()
            .map(|a| (a.id, a.supervisors.into_iter().collect()))
            .collect();
        let sectors = repo
            .list_sectors()?
            .into_iter()
            .map(|s| (s.id, (s.area_id, s.supervisors.into_iter().collect())))
            .collect();
        let groups = repo
            .list_groups()?
            .into_iter()
            .map(|g| {
                (
                    g.id,
                    GroupLeaders {
                        sector_id: g.sector_id,
                        facilitator: g.facilitator_id,
                        host: g.host_id,
                    },
                )
            })
            .collect();
        Ok(Self {
            areas,
            sectors,
            groups,
        })
    }

    fn supervises_area(&self, member: MemberId, area: AreaId) -> bool {
        self.areas
            .get(&area)
            .map(|s| s.contains(&member))
            .unwrap_or(false)
    }

    fn supervises_sector(&self, member: MemberId, sector: SectorId) -> bool {
        self.sectors
            .get(&sector)
            .map(|(_, s)| s.contains(&member))
            .unwrap_or(false)
    }

    /// Whether `actor` may perform `action` on `node`. Unknown nodes permit
    /// nothing.
    pub fn permits(&self, actor: &Actor, node: NodeRef, action: Action) -> bool {
        if actor.is_admin {
            return true;
        }
        let Some(member) = actor.member_id else {
            return false;
        };

        match node {
            NodeRef::Area(area) => {
                self.areas.contains_key(&area) && self.supervises_area(member, area)
            }
            NodeRef::Sector(sector) => {
                let Some((area, _)) = self.sectors.get(&sector) else {
                    return false;
                };
                self.supervises_sector(member, sector)
                    || (action == Action::View && self.supervises_area(member, *area))
            }
            NodeRef::Group(group) => {
                let Some(leaders) = self.groups.get(&group) else {
                    return false;
                };
                if leaders.facilitator == member {
                    return true;
                }
                if leaders.host == member && action != Action::Edit {
                    return true;
                }
                if action != Action::View {
                    return false;
                }
                self.supervises_sector(member, leaders.sector_id)
                    || self
                        .sectors
                        .get(&leaders.sector_id)
                        .map(|(area, _)| self.supervises_area(member, *area))
                        .unwrap_or(false)
            }
        }
    }

    /// Every node `actor` may view, areas first, then sectors, then groups.
    pub fn visible_nodes(&self, actor: &Actor) -> Vec<NodeRef> {
        let areas = self.areas.keys().map(|&id| NodeRef::Area(id));
        let sectors = self.sectors.keys().map(|&id| NodeRef::Sector(id));
        let groups = self.groups.keys().map(|&id| NodeRef::Group(id));
        areas
            .chain(sectors)
            .chain(groups)
            .filter(|node| self.permits(actor, *node, Action::View))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Area, Sector, SmallGroup};

    struct Tree {
        areas: Vec<Area>,
        sectors: Vec<Sector>,
        groups: Vec<SmallGroup>,
    }

    impl HierarchyRepository for Tree {
        fn get_area(&self, id: AreaId) -> Result<Area> {
            self.areas
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .ok_or_else(|| crate::CoreError::not_found("area", id))
        }
        fn get_sector(&self, id: SectorId) -> Result<Sector> {
            self.sectors
                .iter()
                .find(|s| s.id == id)
                .cloned()
                .ok_or_else(|| crate::CoreError::not_found("sector", id))
        }
        fn get_group(&self, id: GroupId) -> Result<SmallGroup> {
            self.groups
                .iter()
                .find(|g| g.id == id)
                .cloned()
                .ok_or_else(|| crate::CoreError::not_found("group", id))
        }
        fn list_areas(&self) -> Result<Vec<Area>> {
            Ok(self.areas.clone())
        }
        fn list_sectors(&self) -> Result<Vec<Sector>> {
            Ok(self.sectors.clone())
        }
        fn list_groups(&self) -> Result<Vec<SmallGroup>> {
            Ok(self.groups.clone())
        }
        fn sectors_in_area(&self, area_id: AreaId) -> Result<Vec<Sector>> {
            Ok(self.sectors.iter().filter(|s| s.area_id == area_id).cloned().collect())
        }
        fn groups_in_sector(&self, sector_id: SectorId) -> Result<Vec<SmallGroup>> {
            Ok(self.groups.iter().filter(|g| g.sector_id == sector_id).cloned().collect())
        }
    }

    const AREA_SUP: MemberId = 1;
    const SECTOR_SUP: MemberId = 2;
    const FACILITATOR: MemberId = 3;
    const HOST: MemberId = 4;
    const OUTSIDER: MemberId = 5;

    fn leadership() -> Leadership {
        let tree = Tree {
            areas: vec![Area {
                id: 10,
                name: "Norte".to_string(),
                supervisors: vec![AREA_SUP],
            }],
            sectors: vec![Sector {
                id: 20,
                name: "Setor 1".to_string(),
                area_id: 10,
                supervisors: vec![SECTOR_SUP],
            }],
            groups: vec![crate::fixtures::group(30, "PG Luz", 20, FACILITATOR, HOST)],
        };
        Leadership::load(&tree).unwrap()
    }

    #[test]
    fn test_admin_may_do_anything() {
        let l = leadership();
        assert!(l.permits(&Actor::admin(), NodeRef::Area(10), Action::Edit));
        assert!(l.permits(&Actor::admin(), NodeRef::Group(999), Action::ManageParticipants));
    }

    #[test]
    fn test_actor_without_member_may_do_nothing() {
        let l = leadership();
        let ghost = Actor {
            member_id: None,
            is_admin: false,
        };
        assert!(!l.permits(&ghost, NodeRef::Group(30), Action::View));
        assert!(l.visible_nodes(&ghost).is_empty());
    }

    #[test]
    fn test_supervision_inherits_view_only() {
        let l = leadership();
        let area_sup = Actor::member(AREA_SUP);
        assert!(l.permits(&area_sup, NodeRef::Area(10), Action::Edit));
        assert!(l.permits(&area_sup, NodeRef::Sector(20), Action::View));
        assert!(!l.permits(&area_sup, NodeRef::Sector(20), Action::Edit));
        assert!(l.permits(&area_sup, NodeRef::Group(30), Action::View));
        assert!(!l.permits(&area_sup, NodeRef::Group(30), Action::ManageParticipants));

        let sector_sup = Actor::member(SECTOR_SUP);
        assert!(!l.permits(&sector_sup, NodeRef::Area(10), Action::View));
        assert!(l.permits(&sector_sup, NodeRef::Sector(20), Action::ManageParticipants));
        assert!(l.permits(&sector_sup, NodeRef::Group(30), Action::View));
        assert!(!l.permits(&sector_sup, NodeRef::Group(30), Action::Edit));
    }

    #[test]
    fn test_group_leaders() {
        let l = leadership();
        let facilitator = Actor::member(FACILITATOR);
        assert!(l.permits(&facilitator, NodeRef::Group(30), Action::Edit));
        assert!(l.permits(&facilitator, NodeRef::Group(30), Action::ManageParticipants));
        assert!(!l.permits(&facilitator, NodeRef::Sector(20), Action::View));

        let host = Actor::member(HOST);
        assert!(l.permits(&host, NodeRef::Group(30), Action::View));
        assert!(l.permits(&host, NodeRef::Group(30), Action::ManageParticipants));
        assert!(!l.permits(&host, NodeRef::Group(30), Action::Edit));
    }

    #[test]
    fn test_visible_nodes() {
        let l = leadership();
        assert_eq!(
            l.visible_nodes(&Actor::member(SECTOR_SUP)),
            vec![NodeRef::Sector(20), NodeRef::Group(30)]
        );
        assert_eq!(
            l.visible_nodes(&Actor::member(AREA_SUP)),
            vec![NodeRef::Area(10), NodeRef::Sector(20), NodeRef::Group(30)]
        );
        assert!(l.visible_nodes(&Actor::member(OUTSIDER)).is_empty());
        assert!(!l.permits(&Actor::member(OUTSIDER), NodeRef::Group(999), Action::View));
    }
}
