//! Home-region target: scaling through the host's template mechanism.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use spillway_cloud::{QuotaApi, TemplateScaling};
use spillway_core::InstanceId;

use crate::error::PlacementResult;
use crate::headroom::home_region_headroom;
use crate::target::RegionTarget;

/// The group's primary region. Instances here are template members managed
/// by the enclosing orchestration; growing and shrinking means re-issuing
/// the template set at a new count. Headroom comes from the region's
/// absolute limits.
pub struct HomeRegion {
    name: String,
    templates: Arc<dyn TemplateScaling>,
    quota: Arc<dyn QuotaApi>,
}

impl HomeRegion {
    pub fn new(name: &str, templates: Arc<dyn TemplateScaling>, quota: Arc<dyn QuotaApi>) -> Self {
        HomeRegion {
            name: name.to_string(),
            templates,
            quota,
        }
    }
}

#[async_trait]
impl RegionTarget for HomeRegion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn has_headroom(&self) -> bool {
        match home_region_headroom(self.quota.as_ref()).await {
            Ok(headroom) => headroom,
            Err(e) => {
                warn!(region = %self.name, error = %e, "headroom query failed, assuming none");
                false
            }
        }
    }

    async fn create(&self, count: u32) -> PlacementResult<Vec<InstanceId>> {
        let before = self.templates.members().await?;
        let target = before.len() as u32 + count;
        debug!(region = %self.name, count, target, "growing template set");
        self.templates.create_or_replace_templates(target).await?;
        let after = self.templates.members().await?;
        Ok(after
            .into_iter()
            .skip(before.len())
            .map(|member| member.id)
            .collect())
    }

    async fn delete(&self, count: u32) -> PlacementResult<()> {
        let before = self.templates.members().await?;
        let target = (before.len() as u32).saturating_sub(count);
        debug!(region = %self.name, count, target, "shrinking template set");
        self.templates.create_or_replace_templates(target).await?;
        Ok(())
    }

    async fn list_ids(&self) -> PlacementResult<Vec<InstanceId>> {
        let members = self.templates.members().await?;
        Ok(members.into_iter().map(|member| member.id).collect())
    }

    async fn member_addresses(&self) -> PlacementResult<Vec<String>> {
        let members = self.templates.members().await?;
        Ok(members
            .into_iter()
            .filter_map(|member| member.address)
            .collect())
    }

    async fn ready(&self) -> PlacementResult<bool> {
        Ok(self.templates.ready().await?)
    }

    async fn teardown(&self) -> PlacementResult<()> {
        // Template members are deleted together with the group resource;
        // nothing for us to do here.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spillway_cloud::sim::{SimQuota, SimTemplateGroup};

    fn make_home(templates: Arc<SimTemplateGroup>, quota: SimQuota) -> HomeRegion {
        HomeRegion::new("region-one", templates, Arc::new(quota))
    }

    #[tokio::test]
    async fn create_grows_the_template_set() {
        let templates = Arc::new(SimTemplateGroup::with_count(2));
        let home = make_home(templates.clone(), SimQuota::roomy());

        let created = home.create(3).await.unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(templates.count(), 5);
        assert_eq!(home.list_ids().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn delete_shrinks_the_template_set() {
        let templates = Arc::new(SimTemplateGroup::with_count(4));
        let home = make_home(templates.clone(), SimQuota::roomy());

        home.delete(3).await.unwrap();
        assert_eq!(templates.count(), 1);
    }

    #[tokio::test]
    async fn headroom_follows_the_oracle() {
        let templates = Arc::new(SimTemplateGroup::new());
        assert!(make_home(templates.clone(), SimQuota::roomy()).has_headroom().await);
        assert!(!make_home(templates.clone(), SimQuota::exhausted()).has_headroom().await);
    }

    #[tokio::test]
    async fn headroom_fails_closed_on_query_errors() {
        let templates = Arc::new(SimTemplateGroup::new());
        let home = make_home(templates, SimQuota::failing("boom"));
        assert!(!home.has_headroom().await);
    }

    #[tokio::test]
    async fn member_addresses_skip_members_without_one() {
        let templates = Arc::new(SimTemplateGroup::with_count(2));
        let home = make_home(templates.clone(), SimQuota::roomy());
        assert_eq!(home.member_addresses().await.unwrap().len(), 2);

        // Members that are still coming up have no address yet.
        templates.set_ready(false);
        assert!(home.member_addresses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn teardown_leaves_template_members_alone() {
        let templates = Arc::new(SimTemplateGroup::with_count(3));
        let home = make_home(templates.clone(), SimQuota::roomy());

        home.teardown().await.unwrap();
        assert_eq!(templates.count(), 3);
        assert!(templates.scale_calls().is_empty());
    }
}
