//! Sample inputs for demos and scenario tests.

/// A complete lumbar-spine MRI request for a UnitedHealthcare member.
pub const SAMPLE_TRANSCRIPT: &str = "I need a prior auth for Jane Doe, date of birth March 15 1965, \
member ID UHC-4429871. She needs an MRI of the lumbar spine, outpatient, at our facility. \
She has been through six weeks of physical therapy with no improvement, \
has radiculopathy with L4-L5 disc herniation confirmed on X-ray.";

/// The same request with the member id left out.
pub const MISSING_MEMBER_TRANSCRIPT: &str = "I need a prior auth for Jane Doe, date of birth March 15 1965. \
She needs an MRI of the lumbar spine, outpatient, at our facility. \
She has been through six weeks of physical therapy with no improvement, \
has radiculopathy with L4-L5 disc herniation confirmed on X-ray.";

/// UnitedHealthcare lumbar MRI policy as a knowledge-base source document.
pub const SAMPLE_POLICY_DOCUMENT: &str = "Policy ID: UHC-LUMBAR-MRI-2026
Payer: UnitedHealthcare
Member ID Prefixes: UHC, UHG
Title: Lumbar Spine MRI Medical Necessity Policy

Covered Procedure Codes: 72148 (MRI lumbar spine without contrast), 72149 (MRI lumbar spine with contrast), 72158 (MRI lumbar spine without and with contrast)

Service Keywords: lumbar spine mri, mri lumbar, lumbar mri

Medical Necessity Criteria (minimum 2 of 3 must be met):
1. conservative_therapy_6w: Failure of at least 6 weeks of conservative therapy.
2. radicular_symptoms: Radicular symptoms or neurologic deficit are documented.
3. objective_imaging_or_exam: Objective imaging or exam findings support lumbar pathology.

Required Documents:
- progress_notes
- conservative_therapy_notes
- imaging_report

Common Denial Patterns:
- Missing conservative treatment duration
- Insufficient neurologic findings documentation
";
